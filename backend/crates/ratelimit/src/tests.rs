//! Unit tests for the rate limit crate

use crate::domain::entities::WindowSnapshot;
use crate::domain::repository::CounterBackend;
use crate::error::{RateLimitError, RateLimitResult};
use crate::{CounterStore, MemoryCounterBackend, WindowLimiter};
use platform::clock::ManualClock;
use std::sync::Arc;
use std::time::Duration;

const T0: i64 = 1_700_000_000;
const TIMEOUT: Duration = Duration::from_millis(2000);

fn memory_limiter(clock: Arc<ManualClock>) -> WindowLimiter<MemoryCounterBackend> {
    let backend = MemoryCounterBackend::new(clock.clone());
    WindowLimiter::new(CounterStore::new(backend, TIMEOUT), clock)
}

/// Errors on every call.
struct FailingBackend;

impl CounterBackend for FailingBackend {
    async fn count_and_record(
        &self,
        _key: &str,
        _now: f64,
        _window_secs: u64,
        _ceiling: u64,
    ) -> RateLimitResult<WindowSnapshot> {
        Err(RateLimitError::Backend("connection refused".to_string()))
    }

    async fn peek(&self, _key: &str, _now: f64, _window_secs: u64) -> RateLimitResult<WindowSnapshot> {
        Err(RateLimitError::Backend("connection refused".to_string()))
    }

    async fn invalidate(&self, _pattern: &str) -> RateLimitResult<u64> {
        Err(RateLimitError::Backend("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Answers far too late, and with a full window.
struct SlowBackend;

impl CounterBackend for SlowBackend {
    async fn count_and_record(
        &self,
        _key: &str,
        _now: f64,
        _window_secs: u64,
        _ceiling: u64,
    ) -> RateLimitResult<WindowSnapshot> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(WindowSnapshot::from_raw(1_000, None))
    }

    async fn peek(&self, _key: &str, _now: f64, _window_secs: u64) -> RateLimitResult<WindowSnapshot> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(WindowSnapshot::from_raw(1_000, None))
    }

    async fn invalidate(&self, _pattern: &str) -> RateLimitResult<u64> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Replies with a negative count.
struct GarbledBackend;

impl CounterBackend for GarbledBackend {
    async fn count_and_record(
        &self,
        _key: &str,
        _now: f64,
        _window_secs: u64,
        _ceiling: u64,
    ) -> RateLimitResult<WindowSnapshot> {
        Ok(WindowSnapshot::from_raw(-7, None))
    }

    async fn peek(&self, _key: &str, _now: f64, _window_secs: u64) -> RateLimitResult<WindowSnapshot> {
        Ok(WindowSnapshot::from_raw(-7, None))
    }

    async fn invalidate(&self, _pattern: &str) -> RateLimitResult<u64> {
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "garbled"
    }
}

#[cfg(test)]
mod limiter_tests {
    use super::*;
    use crate::{PolicyClass, RateLimitKey, RateLimitPolicy, Subject};

    fn key(class: PolicyClass, ip: &str) -> RateLimitKey {
        RateLimitKey::new(class, &Subject::Ip(ip.to_string()))
    }

    #[tokio::test]
    async fn test_three_per_minute_scenario() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = memory_limiter(clock.clone());
        let policy = RateLimitPolicy::new(3, 60);
        let a = key(PolicyClass::Anonymous, "10.0.0.1");

        for _ in 0..3 {
            assert!(limiter.check_rate_limit(&a, policy).await);
        }
        assert_eq!(limiter.get_rate_limit_info(&a, policy).await.remaining, 0);

        clock.advance(Duration::from_secs(10));
        let fourth = limiter.check(&a, policy).await;
        assert!(!fourth.allowed);
        assert_eq!(fourth.info.retry_after, 50);
        assert_eq!(fourth.info.reset_epoch, T0 + 60);

        clock.advance(Duration::from_secs(51));
        assert!(limiter.check_rate_limit(&a, policy).await);
        let info = limiter.get_rate_limit_info(&a, policy).await;
        assert_eq!(info.remaining, 2);
        assert_eq!(info.retry_after, 0);
    }

    #[tokio::test]
    async fn test_nth_admitted_next_rejected() {
        for limit in [1u32, 2, 5, 10] {
            let clock = Arc::new(ManualClock::at_epoch(T0));
            let limiter = memory_limiter(clock.clone());
            let policy = RateLimitPolicy::new(limit, 30);
            let k = key(PolicyClass::Ai, "10.0.0.2");

            for _ in 0..limit {
                assert!(limiter.check_rate_limit(&k, policy).await);
                clock.advance(Duration::from_secs(1));
            }
            assert!(!limiter.check_rate_limit(&k, policy).await, "limit {}", limit);
        }
    }

    #[tokio::test]
    async fn test_recovers_after_window_despite_rejections() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = memory_limiter(clock.clone());
        let policy = RateLimitPolicy::new(2, 60);
        let k = key(PolicyClass::Simulation, "10.0.0.3");

        assert!(limiter.check_rate_limit(&k, policy).await);
        assert!(limiter.check_rate_limit(&k, policy).await);
        for _ in 0..20 {
            clock.advance(Duration::from_secs(2));
            assert!(!limiter.check_rate_limit(&k, policy).await);
        }

        clock.advance(Duration::from_secs(21));
        assert!(limiter.check_rate_limit(&k, policy).await);
    }

    #[tokio::test]
    async fn test_distinct_subjects_are_independent() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = memory_limiter(clock);
        let policy = RateLimitPolicy::new(1, 60);
        let a = key(PolicyClass::PublicApi, "10.0.0.1");
        let b = key(PolicyClass::PublicApi, "10.0.0.2");
        let user = RateLimitKey::new(PolicyClass::PublicApi, &Subject::User("10.0.0.1".into()));

        assert!(limiter.check_rate_limit(&a, policy).await);
        assert!(!limiter.check_rate_limit(&a, policy).await);
        assert!(limiter.check_rate_limit(&b, policy).await);
        assert!(limiter.check_rate_limit(&user, policy).await);
    }

    #[tokio::test]
    async fn test_info_does_not_record() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = memory_limiter(clock);
        let policy = RateLimitPolicy::new(2, 60);
        let k = key(PolicyClass::Anonymous, "10.0.0.4");

        assert!(limiter.check_rate_limit(&k, policy).await);
        let first = limiter.get_rate_limit_info(&k, policy).await;
        for _ in 0..10 {
            assert_eq!(limiter.get_rate_limit_info(&k, policy).await, first);
        }
        assert_eq!(first.remaining, 1);
        assert!(limiter.check_rate_limit(&k, policy).await);
    }

    #[tokio::test]
    async fn test_zero_limit_always_rejects_without_touching_store() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = memory_limiter(clock);
        let policy = RateLimitPolicy::new(0, 60);
        let k = key(PolicyClass::Ai, "10.0.0.5");

        let admission = limiter.check(&k, policy).await;
        assert!(!admission.allowed);
        assert_eq!(admission.info.remaining, 0);
        assert_eq!(admission.info.retry_after, 60);
        assert_eq!(limiter.store().backend().key_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_backend_fails_open() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = WindowLimiter::new(CounterStore::new(FailingBackend, TIMEOUT), clock);
        let policy = RateLimitPolicy::new(1, 60);
        let k = key(PolicyClass::Ai, "10.0.0.6");

        for _ in 0..10 {
            assert!(limiter.check_rate_limit(&k, policy).await);
        }
        assert_eq!(limiter.get_rate_limit_info(&k, policy).await.remaining, 1);
        assert_eq!(limiter.store().invalidate("rate_limit:*").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out_and_fails_open() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = WindowLimiter::new(CounterStore::new(SlowBackend, TIMEOUT), clock);
        let policy = RateLimitPolicy::new(5, 60);
        let k = key(PolicyClass::Anonymous, "10.0.0.7");

        let started = tokio::time::Instant::now();
        assert!(limiter.check_rate_limit(&k, policy).await);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(limiter.get_rate_limit_info(&k, policy).await.remaining, 5);
    }

    #[tokio::test]
    async fn test_negative_count_treated_as_zero() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = WindowLimiter::new(CounterStore::new(GarbledBackend, TIMEOUT), clock);
        let policy = RateLimitPolicy::new(3, 60);
        let k = key(PolicyClass::Anonymous, "10.0.0.8");

        assert!(limiter.check_rate_limit(&k, policy).await);
        let info = limiter.get_rate_limit_info(&k, policy).await;
        assert_eq!(info.remaining, 3);
        assert_eq!(info.retry_after, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_admit_exactly_limit() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let limiter = Arc::new(memory_limiter(clock));
        let policy = RateLimitPolicy::new(10, 60);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let k = key(PolicyClass::Ai, "10.0.0.9");
                    limiter.check_rate_limit(&k, policy).await
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }
}

#[cfg(test)]
mod config_tests {
    use crate::{PolicyClass, PolicyTable, RateLimitPolicy};

    #[test]
    fn test_default_policies() {
        let table = PolicyTable::default();
        assert_eq!(table.get(PolicyClass::Ai), RateLimitPolicy::new(10, 60));
        assert_eq!(table.get(PolicyClass::Simulation), RateLimitPolicy::new(200, 60));
        assert_eq!(table.get(PolicyClass::PublicApi), RateLimitPolicy::new(100, 60));
        assert_eq!(table.get(PolicyClass::Authenticated), RateLimitPolicy::new(1000, 60));
        assert_eq!(table.get(PolicyClass::Anonymous), RateLimitPolicy::new(60, 60));
        assert_eq!(table.get(PolicyClass::Operational), RateLimitPolicy::new(300, 60));
    }

    #[test]
    fn test_class_names() {
        assert_eq!(PolicyClass::PublicApi.env_prefix(), "RATE_LIMIT_PUBLIC_API");
        assert_eq!(PolicyClass::Operational.reported_type(), "public_api");
        assert_eq!(PolicyClass::Operational.as_str(), "operational");
        assert_eq!(PolicyClass::PublicApi.title(), "Public Api");
        assert_eq!(PolicyClass::Ai.title(), "Ai");
    }
}

#[cfg(test)]
mod middleware_tests {
    use super::*;
    use crate::application::config::PolicyTable;
    use crate::middleware::{
        AdmissionState, TrustedSubjectState, enforce_rate_limit, extract_trusted_subject,
        require_subject,
    };
    use crate::RateLimitPolicy;
    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::{Router, middleware};
    use kernel::id::UserId;
    use monitor::{Monitor, MonitorConfig};
    use platform::client::{TrustedProxies, resolve_client};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    const USER: &str = "6f1c2a9e-3f7b-4c1e-9a51-2b8f0d4e7c11";
    const PROXY: [u8; 4] = [192, 0, 2, 1];
    const STRANGER: [u8; 4] = [198, 51, 100, 9];

    fn small_policies() -> PolicyTable {
        PolicyTable {
            ai: RateLimitPolicy::new(2, 60),
            anonymous: RateLimitPolicy::new(3, 60),
            authenticated: RateLimitPolicy::new(5, 60),
            ..PolicyTable::default()
        }
    }

    fn app_with<B>(backend: B, clock: Arc<ManualClock>, enabled: bool) -> (Router, Arc<Monitor>)
    where
        B: CounterBackend + Send + Sync + 'static,
    {
        let monitor = Arc::new(Monitor::new(MonitorConfig::default(), clock.clone()));
        let limiter = Arc::new(WindowLimiter::new(CounterStore::new(backend, TIMEOUT), clock));
        let admission = AdmissionState {
            limiter,
            policies: Arc::new(small_policies()),
            monitor: monitor.clone(),
            enabled,
        };
        let trusted = TrustedSubjectState::new("x-authenticated-user", monitor.clone());

        let app = Router::new()
            .route("/api/v1/mocks", get(|| async { "mocks" }))
            .route("/api/v1/ai/generate", post(|| async { "generated" }))
            .route(
                "/api/v1/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route("/favicon.ico", get(|| async { "icon" }))
            .route(
                "/api/v1/private",
                get(|| async { "private" }).route_layer(middleware::from_fn(require_subject)),
            )
            .layer(middleware::from_fn_with_state(admission, enforce_rate_limit::<B>))
            .layer(middleware::from_fn_with_state(trusted, extract_trusted_subject))
            .layer(middleware::from_fn_with_state(
                Arc::new(TrustedProxies::new(vec![PROXY.into()])),
                resolve_client,
            ));
        (app, monitor)
    }

    fn memory_app() -> (Router, Arc<Monitor>) {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        app_with(MemoryCounterBackend::new(clock.clone()), clock, true)
    }

    fn peer(ip: [u8; 4]) -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from((ip, 40_000)))
    }

    /// Request relayed by the trusted proxy on behalf of `ip`.
    fn get_from(path: &str, ip: &str) -> Request<Body> {
        Request::get(path)
            .extension(peer(PROXY))
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    fn proxied(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.extension(peer(PROXY))
    }

    fn header<'a>(res: &'a axum::response::Response, name: &str) -> Option<&'a str> {
        res.headers().get(name).and_then(|v| v.to_str().ok())
    }

    async fn wait_for_violations(monitor: &Monitor, expected: usize) {
        for _ in 0..100 {
            if monitor.violation_count() >= expected {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_admitted_response_is_decorated() {
        let (app, _) = memory_app();
        let res = app.oneshot(get_from("/api/v1/mocks", "10.0.0.1")).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, "x-ratelimit-limit"), Some("3"));
        assert_eq!(header(&res, "x-ratelimit-remaining"), Some("2"));
        assert_eq!(header(&res, "x-ratelimit-reset"), Some("1700000060"));
        assert_eq!(header(&res, "x-ratelimit-type"), Some("anonymous"));
        assert!(header(&res, "x-process-time").is_some());
    }

    #[tokio::test]
    async fn test_rejection_body_headers_and_violation() {
        let (app, monitor) = memory_app();
        for _ in 0..3 {
            let res = app
                .clone()
                .oneshot(get_from("/api/v1/mocks", "10.0.0.1"))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app
            .clone()
            .oneshot(get_from("/api/v1/mocks", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&res, "x-ratelimit-remaining"), Some("0"));
        assert_eq!(header(&res, "retry-after"), Some("60"));
        assert!(header(&res, "x-ratelimit-type").is_none());

        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(body["limit"], 3);
        assert_eq!(body["window_seconds"], 60);
        assert_eq!(body["retry_after"], 60);
        assert_eq!(body["reset_at"], T0 + 60);
        assert_eq!(
            body["message"],
            "Anonymous rate limit exceeded. Please try again later."
        );

        wait_for_violations(&monitor, 1).await;
        assert_eq!(monitor.violation_count(), 1);

        let other = app.oneshot(get_from("/api/v1/mocks", "10.0.0.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ai_route_under_api_prefix_uses_ai_policy() {
        let (app, _) = memory_app();
        let req = || {
            proxied(Request::post("/api/v1/ai/generate"))
                .header("x-authenticated-user", USER)
                .body(Body::empty())
                .unwrap()
        };

        let res = app.clone().oneshot(req()).await.unwrap();
        assert_eq!(header(&res, "x-ratelimit-type"), Some("ai"));
        assert_eq!(header(&res, "x-ratelimit-limit"), Some("2"));

        app.clone().oneshot(req()).await.unwrap();
        let res = app.oneshot(req()).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_trusted_subject_selects_authenticated_policy() {
        let (app, monitor) = memory_app();
        let res = app
            .clone()
            .oneshot(
                proxied(Request::get("/api/v1/mocks"))
                    .header("x-authenticated-user", USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(header(&res, "x-ratelimit-type"), Some("authenticated"));
        assert_eq!(header(&res, "x-ratelimit-limit"), Some("5"));

        let res = app
            .oneshot(
                proxied(Request::get("/api/v1/mocks"))
                    .header("x-authenticated-user", "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(header(&res, "x-ratelimit-type"), Some("anonymous"));
        assert_eq!(
            monitor.get_security_summary(1).unwrap().by_type["invalid_subject"],
            1
        );
    }

    #[tokio::test]
    async fn test_unclassified_path_passes_through() {
        let (app, _) = memory_app();
        for _ in 0..10 {
            let res = app
                .clone()
                .oneshot(get_from("/favicon.ico", "10.0.0.1"))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            assert!(header(&res, "x-ratelimit-limit").is_none());
        }
    }

    #[tokio::test]
    async fn test_error_response_not_decorated() {
        let (app, _) = memory_app();
        let res = app.oneshot(get_from("/api/v1/broken", "10.0.0.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(header(&res, "x-ratelimit-limit").is_none());
        assert!(header(&res, "x-process-time").is_some());
    }

    #[tokio::test]
    async fn test_failing_store_admits_everything() {
        let (app, monitor) = app_with(FailingBackend, Arc::new(ManualClock::at_epoch(T0)), true);
        for _ in 0..20 {
            let res = app
                .clone()
                .oneshot(get_from("/api/v1/mocks", "10.0.0.1"))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        assert_eq!(monitor.violation_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_limiter_is_transparent() {
        let clock = Arc::new(ManualClock::at_epoch(T0));
        let (app, _) = app_with(MemoryCounterBackend::new(clock.clone()), clock, false);
        for _ in 0..10 {
            let res = app
                .clone()
                .oneshot(get_from("/api/v1/mocks", "10.0.0.1"))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            assert!(header(&res, "x-ratelimit-limit").is_none());
        }
    }

    #[tokio::test]
    async fn test_forwarded_for_from_untrusted_peer_is_ignored() {
        let (app, _) = memory_app();
        let mut admitted = 0;
        for i in 0..50 {
            let req = Request::get("/api/v1/mocks")
                .extension(peer(STRANGER))
                .header("x-forwarded-for", format!("203.0.113.{}", i))
                .body(Body::empty())
                .unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            if res.status() == StatusCode::OK {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
    }

    #[tokio::test]
    async fn test_subject_header_from_untrusted_peer_is_stripped() {
        let (app, monitor) = memory_app();
        let mut statuses = Vec::new();
        for _ in 0..3 {
            let req = Request::post("/api/v1/ai/generate")
                .extension(peer(STRANGER))
                .header("x-authenticated-user", UserId::new().to_string())
                .body(Body::empty())
                .unwrap();
            statuses.push(app.clone().oneshot(req).await.unwrap().status());
        }
        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
        assert_eq!(
            monitor.get_security_summary(1).unwrap().by_type["untrusted_subject"],
            3
        );

        let res = app
            .oneshot(
                Request::get("/api/v1/mocks")
                    .extension(peer(STRANGER))
                    .header("x-authenticated-user", USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(header(&res, "x-ratelimit-type"), Some("anonymous"));
    }

    #[tokio::test]
    async fn test_require_subject_guard() {
        let (app, _) = memory_app();
        let res = app
            .clone()
            .oneshot(get_from("/api/v1/private", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                proxied(Request::get("/api/v1/private"))
                    .header("x-authenticated-user", USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

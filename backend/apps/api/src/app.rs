//! Router assembly
//!
//! Layer order, outermost first: CORS, tracing, client resolution,
//! security headers, security validation, trusted subject, admission.

use axum::http::{HeaderValue, Method, header};
use axum::{Json, Router, middleware, routing::get};
use monitor::middleware::{SecurityValidationState, validate_request};
use crate::headers::security_headers;
use monitor::{Monitor, SecurityValidationConfig, monitoring_router};
use platform::client::{TrustedProxies, resolve_client};
use quota::{LedgerRepository, PlanLookup, QuotaConfig, QuotaGuardState, QuotaLedger};
use ratelimit::middleware::{
    AdmissionState, TrustedSubjectState, enforce_rate_limit, extract_trusted_subject,
    require_subject,
};
use ratelimit::{CounterBackend, RateLimitConfig, WindowLimiter};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer, ExposeHeaders};
use tower_http::trace::TraceLayer;

/// Everything the router needs, already constructed.
pub struct AppParts<B, L, P> {
    pub monitor: Arc<Monitor>,
    pub security: SecurityValidationConfig,
    pub limiter: Arc<WindowLimiter<B>>,
    pub rate_limit: RateLimitConfig,
    pub ledger: Arc<QuotaLedger<L, P>>,
    pub quota: QuotaConfig,
    /// Metered AI routes, mounted under `/api/v1/ai` behind the quota guard
    pub generation: Router,
    pub frontend_origins: Vec<HeaderValue>,
    /// Peers whose forwarding and subject headers are believed
    pub trusted_proxies: TrustedProxies,
}

pub fn router<B, L, P>(parts: AppParts<B, L, P>) -> Router
where
    B: CounterBackend + Send + Sync + 'static,
    L: LedgerRepository + Send + Sync + 'static,
    P: PlanLookup + Send + Sync + 'static,
{
    let guard = QuotaGuardState {
        ledger: parts.ledger.clone(),
        enabled: parts.quota.enabled,
    };
    let ai = quota::usage_router(parts.ledger).merge(quota::metered(parts.generation, guard));

    let admission = AdmissionState {
        limiter: parts.limiter,
        policies: Arc::new(parts.rate_limit.policies.clone()),
        monitor: parts.monitor.clone(),
        enabled: parts.rate_limit.enabled,
    };
    let trusted = TrustedSubjectState::new(
        &parts.rate_limit.trusted_subject_header,
        parts.monitor.clone(),
    );
    let security = SecurityValidationState::new(parts.monitor.clone(), parts.security);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1/ai", ai)
        .nest(
            "/api/v1/monitoring",
            monitoring_router(parts.monitor).route_layer(middleware::from_fn(require_subject)),
        )
        .layer(middleware::from_fn_with_state(
            admission,
            enforce_rate_limit::<B>,
        ))
        .layer(middleware::from_fn_with_state(
            trusted,
            extract_trusted_subject,
        ))
        .layer(middleware::from_fn_with_state(security, validate_request))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn_with_state(
            Arc::new(parts.trusted_proxies),
            resolve_client,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors(parts.frontend_origins))
}

fn cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .expose_headers(ExposeHeaders::list([
            header::RETRY_AFTER,
            header::HeaderName::from_static("x-ratelimit-limit"),
            header::HeaderName::from_static("x-ratelimit-remaining"),
            header::HeaderName::from_static("x-ratelimit-reset"),
            header::HeaderName::from_static("x-ratelimit-type"),
        ]))
        .allow_credentials(true)
}

async fn root() -> Json<Value> {
    Json(json!({ "service": "api", "version": env!("CARGO_PKG_VERSION") }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use monitor::MonitorConfig;
    use platform::clock::ManualClock;
    use quota::{MemoryLedger, MemoryPlanLookup};
    use ratelimit::{CounterStore, MemoryCounterBackend};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tower::ServiceExt;

    const USER: &str = "0b8e1f4a-52c3-4d7e-8f90-1a2b3c4d5e6f";

    fn test_app() -> (Router, Arc<Monitor>) {
        let clock = Arc::new(ManualClock::at_epoch(1_700_000_000));
        let monitor = Arc::new(Monitor::new(MonitorConfig::default(), clock.clone()));
        let limiter = Arc::new(WindowLimiter::new(
            CounterStore::new(
                MemoryCounterBackend::new(clock.clone()),
                Duration::from_secs(2),
            ),
            clock.clone(),
        ));
        let ledger = Arc::new(QuotaLedger::new(
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryPlanLookup::new()),
            clock,
        ));

        let app = router(AppParts {
            monitor: monitor.clone(),
            security: SecurityValidationConfig::default(),
            limiter,
            rate_limit: RateLimitConfig::default(),
            ledger,
            quota: QuotaConfig::default(),
            generation: Router::new().route("/generate", axum::routing::post(|| async { "ok" })),
            frontend_origins: vec![HeaderValue::from_static("http://localhost:3000")],
            trusted_proxies: TrustedProxies::default(),
        });
        (app, monitor)
    }

    /// Browser request relayed by the local reverse proxy.
    fn browser(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50_000))))
            .header(header::USER_AGENT, "Mozilla/5.0")
            .header("x-forwarded-for", "203.0.113.7")
    }

    /// Browser request straight from a remote peer.
    fn direct(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.extension(ConnectInfo(SocketAddr::from(([198, 51, 100, 9], 50_000))))
            .header(header::USER_AGENT, "Mozilla/5.0")
    }

    #[tokio::test]
    async fn test_health_is_operational_class() {
        let (app, _) = test_app();
        let res = app
            .oneshot(browser(Request::get("/health")).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-limit"], "300");
        assert_eq!(res.headers()["x-ratelimit-type"], "public_api");
    }

    #[tokio::test]
    async fn test_usage_through_full_stack() {
        let (app, _) = test_app();
        let res = app
            .oneshot(
                browser(Request::get("/api/v1/ai/usage"))
                    .header("x-authenticated-user", USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-type"], "ai");
        assert_eq!(res.headers()["x-ratelimit-limit"], "10");
    }

    #[tokio::test]
    async fn test_usage_without_subject_is_401() {
        let (app, _) = test_app();
        let res = app
            .oneshot(browser(Request::get("/api/v1/ai/usage")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_injection_rejected_before_admission() {
        let (app, monitor) = test_app();
        let res = app
            .oneshot(
                browser(Request::get("/api/v1/mocks?q=1%20union%20select%20*"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().get("x-ratelimit-limit").is_none());
        assert_eq!(monitor.security_event_count(), 1);
    }

    #[tokio::test]
    async fn test_generation_is_quota_guarded() {
        let (app, _) = test_app();
        let res = app
            .oneshot(browser(Request::post("/api/v1/ai/generate")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_spoofed_subjects_from_remote_peer_get_nothing() {
        let (app, _) = test_app();
        for i in 0..30u64 {
            let res = app
                .clone()
                .oneshot(
                    direct(Request::post("/api/v1/ai/generate"))
                        .header(
                            "x-authenticated-user",
                            format!("0b8e1f4a-52c3-4d7e-8f90-{:012x}", i),
                        )
                        .header("x-forwarded-for", "203.0.113.50")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_ne!(res.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_monitoring_requires_subject() {
        let (app, _) = test_app();
        let res = app
            .clone()
            .oneshot(
                browser(Request::get("/api/v1/monitoring/violations"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                browser(Request::get("/api/v1/monitoring/violations"))
                    .header("x-authenticated-user", USER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_security_headers_on_every_response() {
        let (app, _) = test_app();
        let ok = app
            .clone()
            .oneshot(browser(Request::get("/health")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let rejected = app
            .clone()
            .oneshot(
                browser(Request::get("/api/v1/mocks?q=1%20union%20select%20*"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        for res in [&ok, &rejected] {
            assert_eq!(res.headers()["x-content-type-options"], "nosniff");
            assert_eq!(res.headers()["x-frame-options"], "DENY");
            assert_eq!(res.headers()["x-xss-protection"], "1; mode=block");
            assert_eq!(
                res.headers()["referrer-policy"],
                "strict-origin-when-cross-origin"
            );
            assert_eq!(
                res.headers()["permissions-policy"],
                "camera=(), microphone=(), geolocation=()"
            );
            assert!(res.headers().get("strict-transport-security").is_none());
        }

        let https = app
            .clone()
            .oneshot(
                browser(Request::get("/health"))
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            https.headers()["strict-transport-security"],
            "max-age=31536000; includeSubDomains"
        );

        let spoofed = app
            .oneshot(
                direct(Request::get("/health"))
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(spoofed.headers().get("strict-transport-security").is_none());
    }
}

//! Rate Limit Middleware
//!
//! `extract_trusted_subject` turns the upstream authentication header into
//! an [`AuthenticatedSubject`] extension; `enforce_rate_limit` classifies,
//! checks and decorates every request; `require_subject` guards routes that
//! need a subject.

use crate::application::config::PolicyTable;
use crate::application::limiter::WindowLimiter;
use crate::domain::entities::{PolicyClass, RateLimitInfo, RateLimitPolicy};
use crate::domain::repository::CounterBackend;
use crate::domain::services::{API_PREFIX, classify};
use crate::domain::value_objects::{AuthenticatedSubject, RateLimitKey, Subject};
use crate::presentation::dto::{RATE_LIMIT_EXCEEDED, RateLimitExceededBody};
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use kernel::id::UserId;
use monitor::{Metadata, Monitor, SecurityEventReport, Severity, ViolationReport};
use platform::client::{client_addr, client_ip_label, user_agent};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
pub const HEADER_TYPE: &str = "x-ratelimit-type";
pub const HEADER_PROCESS_TIME: &str = "x-process-time";

/// Admission middleware state
pub struct AdmissionState<B> {
    pub limiter: Arc<WindowLimiter<B>>,
    pub policies: Arc<PolicyTable>,
    pub monitor: Arc<Monitor>,
    pub enabled: bool,
}

impl<B> Clone for AdmissionState<B> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            policies: self.policies.clone(),
            monitor: self.monitor.clone(),
            enabled: self.enabled,
        }
    }
}

/// Classify, count, and either reject with 429 or run the handler and
/// decorate its response.
pub async fn enforce_rate_limit<B>(
    State(state): State<AdmissionState<B>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    B: CounterBackend + Send + Sync + 'static,
{
    if !state.enabled {
        return next.run(req).await;
    }

    let user = req.extensions().get::<AuthenticatedSubject>().cloned();
    let Some(class) = classify(req.uri().path(), req.method(), user.is_some()) else {
        return next.run(req).await;
    };
    let policy = state.policies.get(class);

    let ip = client_addr(req.extensions()).ip;
    let subject = Subject::resolve(user.as_ref(), ip);
    let key = RateLimitKey::new(class, &subject);

    let admission = state.limiter.check(&key, policy).await;
    if !admission.allowed {
        let report = ViolationReport {
            policy_class: class.reported_type().to_string(),
            user_id: subject.user_id().map(str::to_string),
            ip: client_ip_label(ip),
            endpoint: req.uri().path().to_string(),
            method: req.method().to_string(),
            metadata: violation_metadata(req.headers(), &key, state.limiter.now()),
        };
        let monitor = state.monitor.clone();
        tokio::spawn(async move { monitor.log_violation(report) });

        return rejection(class, policy, admission.info);
    }

    let started = Instant::now();
    let mut response = next.run(req).await;

    if response.status().as_u16() < 400 {
        let info = state.limiter.get_rate_limit_info(&key, policy).await;
        let headers = response.headers_mut();
        set_limit_headers(headers, &info);
        headers.insert(
            HeaderName::from_static(HEADER_TYPE),
            HeaderValue::from_static(class.reported_type()),
        );
    }

    let elapsed = started.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed)) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(HEADER_PROCESS_TIME), value);
    }

    response
}

fn rejection(class: PolicyClass, policy: RateLimitPolicy, info: RateLimitInfo) -> Response {
    let body = RateLimitExceededBody {
        error: RATE_LIMIT_EXCEEDED,
        message: format!(
            "{} rate limit exceeded. Please try again later.",
            class.title()
        ),
        limit: info.limit,
        window_seconds: policy.window_secs,
        retry_after: info.retry_after,
        reset_at: info.reset_epoch,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    set_limit_headers(headers, &info);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(info.retry_after));
    response
}

fn set_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert(
        HeaderName::from_static(HEADER_LIMIT),
        HeaderValue::from(info.limit),
    );
    headers.insert(
        HeaderName::from_static(HEADER_REMAINING),
        HeaderValue::from(info.remaining),
    );
    headers.insert(
        HeaderName::from_static(HEADER_RESET),
        HeaderValue::from(info.reset_epoch),
    );
}

fn violation_metadata(headers: &HeaderMap, key: &RateLimitKey, now: f64) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "user_agent".to_string(),
        user_agent(headers).unwrap_or("unknown").into(),
    );
    metadata.insert("key".to_string(), key.as_str().into());
    metadata.insert("timestamp".to_string(), now.into());
    metadata
}

/// Trusted subject middleware state
#[derive(Clone)]
pub struct TrustedSubjectState {
    pub header: HeaderName,
    pub monitor: Arc<Monitor>,
}

impl TrustedSubjectState {
    pub fn new(header: &str, monitor: Arc<Monitor>) -> Self {
        let header = HeaderName::from_bytes(header.as_bytes()).unwrap_or_else(|_| {
            tracing::warn!(header, "Invalid trusted subject header name, using default");
            HeaderName::from_static("x-authenticated-user")
        });
        Self { header, monitor }
    }
}

/// Copy the verified subject id from the trusted header into request
/// extensions. The header is only honoured on requests that came through a
/// trusted proxy; elsewhere it is stripped. Malformed or untrusted values on
/// API routes are reported.
pub async fn extract_trusted_subject(
    State(state): State<TrustedSubjectState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Only this layer sets the subject
    req.extensions_mut().remove::<AuthenticatedSubject>();

    let addr = client_addr(req.extensions());
    if !addr.via_trusted_proxy {
        if req.headers_mut().remove(&state.header).is_some() {
            report_subject_event(
                &state,
                &req,
                addr.ip,
                "untrusted_subject",
                "Subject header from untrusted peer ignored",
            );
        }
        return next.run(req).await;
    }

    let parsed = req.headers().get(&state.header).map(|value| {
        value
            .to_str()
            .ok()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse::<UserId>().ok())
    });

    match parsed {
        None => {}
        Some(Some(user_id)) => {
            req.extensions_mut().insert(AuthenticatedSubject(user_id));
        }
        Some(None) => report_subject_event(
            &state,
            &req,
            addr.ip,
            "invalid_subject",
            "Malformed authenticated subject header",
        ),
    }

    next.run(req).await
}

fn report_subject_event(
    state: &TrustedSubjectState,
    req: &Request<Body>,
    ip: Option<IpAddr>,
    event_type: &str,
    description: &str,
) {
    if !req.uri().path().to_lowercase().starts_with(API_PREFIX) {
        return;
    }
    state.monitor.log_security_event(
        SecurityEventReport::new(event_type, Severity::Medium, description, client_ip_label(ip))
            .with_meta("endpoint", req.uri().path()),
    );
}

/// Reject requests that carry no [`AuthenticatedSubject`] with 401.
pub async fn require_subject(req: Request<Body>, next: Next) -> Response {
    if req.extensions().get::<AuthenticatedSubject>().is_none() {
        return AppError::unauthorized("Authentication required").into_response();
    }
    next.run(req).await
}

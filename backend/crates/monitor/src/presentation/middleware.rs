//! Security Validation Middleware
//!
//! Screens requests before they reach rate limiting or handlers and feeds
//! the security event stream.

use crate::application::config::SecurityValidationConfig;
use crate::application::monitor::Monitor;
use crate::domain::entities::{SecurityEventReport, Severity};
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use platform::client::{client_addr, client_ip_label, user_agent};
use std::sync::Arc;

/// Middleware state
#[derive(Clone)]
pub struct SecurityValidationState {
    pub monitor: Arc<Monitor>,
    pub config: Arc<SecurityValidationConfig>,
}

impl SecurityValidationState {
    pub fn new(monitor: Arc<Monitor>, config: SecurityValidationConfig) -> Self {
        Self {
            monitor,
            config: Arc::new(config),
        }
    }
}

/// Reject oversized or injection-looking requests; flag odd User-Agents.
pub async fn validate_request(
    State(state): State<SecurityValidationState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.enabled {
        return next.run(req).await;
    }

    let ip = client_ip_label(client_addr(req.extensions()).ip);
    let path = req.uri().path().to_string();

    if let Some(length) = content_length(&req).filter(|l| *l > state.config.max_request_bytes) {
        state.monitor.log_security_event(
            SecurityEventReport::new(
                "large_request",
                Severity::Medium,
                format!("Request body of {} bytes exceeds limit", length),
                ip,
            )
            .with_meta("content_length", length)
            .with_meta("endpoint", path),
        );
        return AppError::payload_too_large("Request body too large").into_response();
    }

    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.uri().path());
    if let Some(pattern) = find_injection_pattern(&state.config, target) {
        state.monitor.log_security_event(
            SecurityEventReport::new(
                "suspicious_request",
                Severity::High,
                "Request matched an injection pattern",
                ip,
            )
            .with_meta("pattern", pattern)
            .with_meta("endpoint", path),
        );
        return AppError::bad_request("Request contains disallowed content")
            .with_code("SUSPICIOUS_REQUEST")
            .into_response();
    }

    match user_agent(req.headers()).filter(|ua| !ua.trim().is_empty()) {
        None => state.monitor.log_security_event(
            SecurityEventReport::new(
                "suspicious_user_agent",
                Severity::Low,
                "Request without User-Agent",
                ip,
            )
            .with_meta("endpoint", path),
        ),
        Some(ua) if is_crawler(&state.config, ua) => state.monitor.log_security_event(
            SecurityEventReport::new(
                "suspicious_user_agent",
                Severity::Low,
                "Crawler-like User-Agent",
                ip,
            )
            .with_meta("user_agent", ua)
            .with_meta("endpoint", path),
        ),
        Some(_) => {}
    }

    next.run(req).await
}

fn content_length(req: &Request<Body>) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// First configured pattern found in the lowercased target, reading `+`
/// and `%20` as spaces.
pub(crate) fn find_injection_pattern(
    config: &SecurityValidationConfig,
    target: &str,
) -> Option<&'static str> {
    let normalized = target.to_lowercase().replace("%20", " ").replace('+', " ");
    config
        .injection_patterns
        .iter()
        .copied()
        .find(|p| normalized.contains(p))
}

pub(crate) fn is_crawler(config: &SecurityValidationConfig, ua: &str) -> bool {
    let ua = ua.to_lowercase();
    config.crawler_markers.iter().any(|m| ua.contains(m))
}

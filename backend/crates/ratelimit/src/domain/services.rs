//! Domain Services
//!
//! Endpoint classification and sliding-window arithmetic. No I/O.

use super::entities::{PolicyClass, RateLimitInfo, RateLimitPolicy, WindowSnapshot};
use axum::http::Method;

/// Authenticated API prefix
pub const API_PREFIX: &str = "/api/v1/";

const AI_MARKERS: [&str; 2] = ["/ai/", "/generate"];
const SIMULATION_MARKER: &str = "/simulate/";
const PUBLIC_MOCKS_MARKER: &str = "/mocks/public";
const OPERATIONAL_PATHS: [&str; 5] = ["/", "/health", "/docs", "/redoc", "/openapi.json"];

/// Map a request to its policy class. First match wins; `None` means the
/// request is not rate limited.
pub fn classify(path: &str, method: &Method, has_subject: bool) -> Option<PolicyClass> {
    let path = path.to_lowercase();

    if AI_MARKERS.iter().any(|m| path.contains(m)) {
        return Some(PolicyClass::Ai);
    }
    if path.contains(SIMULATION_MARKER) {
        return Some(PolicyClass::Simulation);
    }
    if path.contains(PUBLIC_MOCKS_MARKER) && (*method == Method::GET || *method == Method::HEAD) {
        return Some(PolicyClass::PublicApi);
    }
    if path.starts_with(API_PREFIX) {
        return Some(if has_subject {
            PolicyClass::Authenticated
        } else {
            PolicyClass::Anonymous
        });
    }
    if OPERATIONAL_PATHS.contains(&path.as_str()) {
        return Some(PolicyClass::Operational);
    }
    None
}

/// Turn a counter snapshot into the caller-facing view.
///
/// `reset_epoch` is when the oldest counted entry leaves the window (or a
/// full window from now when nothing is counted). `retry_after` is only
/// non-zero once the window is full.
pub fn window_info(policy: RateLimitPolicy, snapshot: WindowSnapshot, now: f64) -> RateLimitInfo {
    let window = policy.window_secs as f64;
    let reset = match snapshot.oldest {
        Some(oldest) => oldest + window,
        None => now + window,
    };
    let used = u32::try_from(snapshot.count).unwrap_or(u32::MAX);
    let remaining = policy.limit.saturating_sub(used);
    let retry_after = if remaining == 0 {
        ((reset - now).ceil() as i64).max(1) as u64
    } else {
        0
    };

    RateLimitInfo {
        limit: policy.limit,
        remaining,
        reset_epoch: reset.ceil() as i64,
        retry_after,
    }
}

/// Admission rule: the `limit`-th request in a window is admitted, the next
/// one is not.
pub fn is_admitted(policy: RateLimitPolicy, count_with_attempt: u64) -> bool {
    policy.limit > 0 && count_with_attempt <= u64::from(policy.limit)
}

/// `*`-only glob match used for key invalidation.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = key.strip_prefix(first) else {
        return false;
    };
    let last = rest[rest.len() - 1];
    for part in &rest[..rest.len() - 1] {
        match remaining.find(part) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}

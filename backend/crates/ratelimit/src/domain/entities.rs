//! Domain Entities

use serde::Serialize;
use std::fmt;

/// Named endpoint category, each with its own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyClass {
    Ai,
    Simulation,
    PublicApi,
    Authenticated,
    Anonymous,
    /// Root, health and docs endpoints
    Operational,
}

impl PolicyClass {
    pub const ALL: [PolicyClass; 6] = [
        PolicyClass::Ai,
        PolicyClass::Simulation,
        PolicyClass::PublicApi,
        PolicyClass::Authenticated,
        PolicyClass::Anonymous,
        PolicyClass::Operational,
    ];

    /// Name used in counter keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyClass::Ai => "ai",
            PolicyClass::Simulation => "simulation",
            PolicyClass::PublicApi => "public_api",
            PolicyClass::Authenticated => "authenticated",
            PolicyClass::Anonymous => "anonymous",
            PolicyClass::Operational => "operational",
        }
    }

    /// Name exposed in `X-RateLimit-Type` and violation records.
    pub fn reported_type(&self) -> &'static str {
        match self {
            PolicyClass::Operational => "public_api",
            other => other.as_str(),
        }
    }

    /// Env var prefix, e.g. `RATE_LIMIT_PUBLIC_API`.
    pub fn env_prefix(&self) -> String {
        format!("RATE_LIMIT_{}", self.as_str().to_ascii_uppercase())
    }

    /// "Public Api" style label for rejection messages.
    pub fn title(&self) -> String {
        self.reported_type()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission ceiling for one policy class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests admitted per window; 0 rejects everything
    pub limit: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    pub const fn new(limit: u32, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }
}

/// Result of a counter read.
///
/// `count` is the number of in-window entries (including the current
/// attempt for `count_and_record`); `oldest` is the earliest in-window
/// timestamp in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowSnapshot {
    pub count: u64,
    pub oldest: Option<f64>,
}

impl WindowSnapshot {
    /// Normalize a raw backend reply: negative counts clamp to 0 and
    /// non-finite timestamps are dropped.
    pub fn from_raw(count: i64, oldest: Option<f64>) -> Self {
        Self {
            count: u64::try_from(count).unwrap_or(0),
            oldest: oldest.filter(|t| t.is_finite()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Limiter state exposed to callers and headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the oldest counted entry expires
    pub reset_epoch: i64,
    /// Seconds until a new request can succeed; 0 while capacity remains
    pub retry_after: u64,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub info: RateLimitInfo,
}

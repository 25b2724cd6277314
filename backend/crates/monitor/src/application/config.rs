//! Application Configuration
//!
//! Buffer sizes, retention, maintenance cadence and request validation rules.

use platform::config::{env_flag, env_or};
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Violation buffer cap
    pub max_violations: usize,
    /// Security event buffer cap
    pub max_security_events: usize,
    /// Records older than this are purged
    pub retention: Duration,
    /// Default for `get_suspicious_activity`
    pub suspicious_threshold: u32,
    /// Lookback for suspicious activity aggregation
    pub suspicious_lookback: Duration,
    /// Maintenance loop period
    pub cleanup_interval: Duration,
    /// Delay before retrying a failed maintenance pass
    pub retry_backoff: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_violations: 1000,
            max_security_events: 5000,
            retention: Duration::from_secs(24 * 3600),
            suspicious_threshold: 50,
            suspicious_lookback: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(3600),
            retry_backoff: Duration::from_secs(300),
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            suspicious_threshold: env_or(
                "SUSPICIOUS_ACTIVITY_THRESHOLD",
                defaults.suspicious_threshold,
            ),
            cleanup_interval: Duration::from_secs(
                env_or("MONITOR_CLEANUP_INTERVAL_SECS", 3600u64).max(1),
            ),
            retry_backoff: Duration::from_secs(env_or("MONITOR_RETRY_BACKOFF_SECS", 300u64).max(1)),
            ..defaults
        }
    }
}

/// Request validation rules
#[derive(Debug, Clone)]
pub struct SecurityValidationConfig {
    pub enabled: bool,
    /// Largest accepted `Content-Length`
    pub max_request_bytes: u64,
    /// Lowercase substrings rejected in path and query
    pub injection_patterns: Vec<&'static str>,
    /// Lowercase User-Agent markers that flag a crawler
    pub crawler_markers: Vec<&'static str>,
}

impl Default for SecurityValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_request_bytes: 10 * 1024 * 1024,
            injection_patterns: vec![
                "union select",
                "drop table",
                "delete from",
                "insert into",
                "update set",
                "<script",
                "javascript:",
                "vbscript:",
                "onload=",
                "onerror=",
            ],
            crawler_markers: vec!["bot", "crawler", "spider", "scraper"],
        }
    }
}

impl SecurityValidationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("SECURITY_VALIDATION_ENABLED", true),
            max_request_bytes: env_or("MAX_REQUEST_BYTES", defaults.max_request_bytes),
            ..defaults
        }
    }
}

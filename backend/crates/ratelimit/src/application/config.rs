//! Application Configuration
//!
//! Policies are loaded once at startup and never change afterwards.

use crate::domain::entities::{PolicyClass, RateLimitPolicy};
use platform::config::{env_flag, env_opt, env_or};
use std::time::Duration;

/// Policy per class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    pub ai: RateLimitPolicy,
    pub simulation: RateLimitPolicy,
    pub public_api: RateLimitPolicy,
    pub authenticated: RateLimitPolicy,
    pub anonymous: RateLimitPolicy,
    pub operational: RateLimitPolicy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            ai: RateLimitPolicy::new(10, 60),
            simulation: RateLimitPolicy::new(200, 60),
            public_api: RateLimitPolicy::new(100, 60),
            authenticated: RateLimitPolicy::new(1000, 60),
            anonymous: RateLimitPolicy::new(60, 60),
            operational: RateLimitPolicy::new(300, 60),
        }
    }
}

impl PolicyTable {
    pub fn get(&self, class: PolicyClass) -> RateLimitPolicy {
        match class {
            PolicyClass::Ai => self.ai,
            PolicyClass::Simulation => self.simulation,
            PolicyClass::PublicApi => self.public_api,
            PolicyClass::Authenticated => self.authenticated,
            PolicyClass::Anonymous => self.anonymous,
            PolicyClass::Operational => self.operational,
        }
    }

    fn get_mut(&mut self, class: PolicyClass) -> &mut RateLimitPolicy {
        match class {
            PolicyClass::Ai => &mut self.ai,
            PolicyClass::Simulation => &mut self.simulation,
            PolicyClass::PublicApi => &mut self.public_api,
            PolicyClass::Authenticated => &mut self.authenticated,
            PolicyClass::Anonymous => &mut self.anonymous,
            PolicyClass::Operational => &mut self.operational,
        }
    }

    /// Defaults overridden by `RATE_LIMIT_<CLASS>_LIMIT` / `_WINDOW`.
    pub fn from_env() -> Self {
        let mut table = Self::default();
        for class in PolicyClass::ALL {
            let prefix = class.env_prefix();
            let policy = table.get_mut(class);
            policy.limit = env_or(&format!("{}_LIMIT", prefix), policy.limit);
            policy.window_secs = env_or(&format!("{}_WINDOW", prefix), policy.window_secs).max(1);
        }
        table
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub policies: PolicyTable,
    /// Shared counter store; `None` selects the in-process store
    pub redis_url: Option<String>,
    /// Deadline for each counter store call
    pub store_timeout: Duration,
    /// Header carrying the verified subject id
    pub trusted_subject_header: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policies: PolicyTable::default(),
            redis_url: None,
            store_timeout: Duration::from_millis(2000),
            trusted_subject_header: "x-authenticated-user".to_string(),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("RATE_LIMIT_ENABLED", true),
            policies: PolicyTable::from_env(),
            redis_url: env_opt("REDIS_URL"),
            store_timeout: Duration::from_millis(env_or("COUNTER_STORE_TIMEOUT_MS", 2000u64).max(1)),
            trusted_subject_header: env_opt("TRUSTED_SUBJECT_HEADER")
                .map(|h| h.to_ascii_lowercase())
                .unwrap_or(defaults.trusted_subject_header),
        }
    }
}

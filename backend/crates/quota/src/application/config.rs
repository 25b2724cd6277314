//! Application Configuration

use platform::config::env_flag;

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// When off, the quota guard admits everything and records nothing
    pub enabled: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl QuotaConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("QUOTA_ENFORCEMENT_ENABLED", true),
        }
    }
}

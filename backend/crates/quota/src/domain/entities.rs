//! Domain Entities

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::Serialize;

pub const FREE_PLAN_NAME: &str = "free";
pub const FREE_DAILY_REQUESTS: i64 = 10;
pub const FREE_MONTHLY_TOKENS: i64 = 10_000;

/// Durable per-user usage counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageQuota {
    pub user_id: UserId,
    pub requests_today: i64,
    pub requests_this_month: i64,
    pub tokens_used_today: i64,
    pub tokens_used_this_month: i64,
    pub rate_limit_remaining: i64,
    pub rate_limit_reset: DateTime<Utc>,
    pub last_request: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UsageQuota {
    /// Row for a user that has never been seen.
    pub fn zeroed(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            requests_today: 0,
            requests_this_month: 0,
            tokens_used_today: 0,
            tokens_used_this_month: 0,
            rate_limit_remaining: FREE_DAILY_REQUESTS,
            rate_limit_reset: super::services::next_utc_midnight(now),
            last_request: None,
            updated_at: now,
        }
    }
}

/// Quotas granted by a user's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanQuota {
    pub plan_name: String,
    pub daily_request_quota: i64,
    pub monthly_token_quota: i64,
}

impl PlanQuota {
    pub fn free() -> Self {
        Self {
            plan_name: FREE_PLAN_NAME.to_string(),
            daily_request_quota: FREE_DAILY_REQUESTS,
            monthly_token_quota: FREE_MONTHLY_TOKENS,
        }
    }

    /// Build from a lookup row; missing or negative fields take the Free value.
    pub fn from_lookup(
        plan_name: Option<String>,
        daily_request_quota: Option<i64>,
        monthly_token_quota: Option<i64>,
    ) -> Self {
        let plan_name = plan_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FREE_PLAN_NAME.to_string());

        let daily_request_quota = match daily_request_quota {
            Some(q) if q >= 0 => q,
            _ => {
                tracing::warn!(plan = %plan_name, "Invalid daily quota, using free plan default");
                FREE_DAILY_REQUESTS
            }
        };
        let monthly_token_quota = match monthly_token_quota {
            Some(q) if q >= 0 => q,
            _ => {
                tracing::warn!(plan = %plan_name, "Invalid monthly quota, using free plan default");
                FREE_MONTHLY_TOKENS
            }
        };

        Self {
            plan_name,
            daily_request_quota,
            monthly_token_quota,
        }
    }
}

/// Amounts added by one metered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageDelta {
    pub requests: i64,
    pub tokens: i64,
}

impl UsageDelta {
    /// One request that consumed `tokens`.
    pub fn request(tokens: i64) -> Self {
        Self {
            requests: 1,
            tokens: tokens.max(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Pass,
    DailyExceeded { quota: i64 },
    MonthlyExceeded { quota: i64 },
}

/// Ledger row enriched with plan data, as served by the usage endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub user_id: UserId,
    pub requests_today: i64,
    pub requests_this_month: i64,
    pub tokens_used_today: i64,
    pub tokens_used_this_month: i64,
    pub rate_limit_remaining: i64,
    pub rate_limit_reset: DateTime<Utc>,
    pub last_request: Option<DateTime<Utc>>,
    pub plan_name: String,
    pub daily_request_quota: i64,
    pub monthly_token_quota: i64,
    pub quota_percentage_used: f64,
}

//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entities::{PlanQuota, UsageDelta, UsageQuota};
use crate::error::QuotaResult;
use chrono::{DateTime, Utc};
use kernel::id::UserId;

/// Usage ledger
#[trait_variant::make(LedgerRepository: Send)]
pub trait LocalLedgerRepository {
    /// Current row, as stored
    async fn find(&self, user_id: UserId) -> QuotaResult<Option<UsageQuota>>;

    /// Insert a zeroed row; an existing row is left untouched
    async fn create_if_absent(&self, user_id: UserId, now: DateTime<Utc>) -> QuotaResult<()>;

    /// Add `delta` in one atomic step, creating the row if needed.
    /// Counters whose period ended before `now` restart from zero;
    /// `rate_limit_remaining` is recomputed against `daily_quota`.
    async fn increment(
        &self,
        user_id: UserId,
        delta: UsageDelta,
        daily_quota: i64,
        now: DateTime<Utc>,
    ) -> QuotaResult<UsageQuota>;
}

/// External plan assignment
#[trait_variant::make(PlanLookup: Send)]
pub trait LocalPlanLookup {
    /// `None` when the user has no plan row
    async fn plan_for(&self, user_id: UserId) -> QuotaResult<Option<PlanQuota>>;
}

//! In-process ledger and plan table
//!
//! Single-process stand-ins for the database repositories, with the same
//! atomicity per user: each increment runs under the map's entry lock.

use crate::domain::entities::{PlanQuota, UsageDelta, UsageQuota};
use crate::domain::repository::{LedgerRepository, PlanLookup};
use crate::domain::services::rollover;
use crate::error::QuotaResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kernel::id::UserId;

#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: DashMap<UserId, UsageQuota>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl LedgerRepository for MemoryLedger {
    async fn find(&self, user_id: UserId) -> QuotaResult<Option<UsageQuota>> {
        Ok(self.rows.get(&user_id).map(|row| row.value().clone()))
    }

    async fn create_if_absent(&self, user_id: UserId, now: DateTime<Utc>) -> QuotaResult<()> {
        self.rows
            .entry(user_id)
            .or_insert_with(|| UsageQuota::zeroed(user_id, now));
        Ok(())
    }

    async fn increment(
        &self,
        user_id: UserId,
        delta: UsageDelta,
        daily_quota: i64,
        now: DateTime<Utc>,
    ) -> QuotaResult<UsageQuota> {
        let mut entry = self
            .rows
            .entry(user_id)
            .or_insert_with(|| UsageQuota::zeroed(user_id, now));

        let mut row = rollover(entry.value().clone(), now);
        row.requests_today += delta.requests;
        row.requests_this_month += delta.requests;
        row.tokens_used_today += delta.tokens;
        row.tokens_used_this_month += delta.tokens;
        row.rate_limit_remaining = (daily_quota - row.requests_today).max(0);
        row.last_request = Some(now);
        row.updated_at = now;

        *entry = row.clone();
        Ok(row)
    }
}

#[derive(Debug, Default)]
pub struct MemoryPlanLookup {
    plans: DashMap<UserId, PlanQuota>,
}

impl MemoryPlanLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, user_id: UserId, plan: PlanQuota) {
        self.plans.insert(user_id, plan);
    }
}

impl PlanLookup for MemoryPlanLookup {
    async fn plan_for(&self, user_id: UserId) -> QuotaResult<Option<PlanQuota>> {
        Ok(self.plans.get(&user_id).map(|p| p.value().clone()))
    }
}

//! Quota Ledger
//!
//! Per-user daily request and monthly token accounting in front of a
//! costly operation. Lookup failures degrade to a safe view: an unknown
//! plan means the Free plan, and an unreadable ledger reads as zero usage.

use crate::domain::entities::{PlanQuota, QuotaDecision, UsageDelta, UsageQuota, UsageReport};
use crate::domain::repository::{LedgerRepository, PlanLookup};
use crate::domain::services::{evaluate, report, rollover};
use crate::error::{QuotaError, QuotaResult};
use kernel::id::UserId;
use platform::clock::SharedClock;
use std::sync::Arc;

pub struct QuotaLedger<L, P> {
    repo: Arc<L>,
    plans: Arc<P>,
    clock: SharedClock,
}

impl<L, P> QuotaLedger<L, P>
where
    L: LedgerRepository + Send + Sync + 'static,
    P: PlanLookup + Send + Sync + 'static,
{
    pub fn new(repo: Arc<L>, plans: Arc<P>, clock: SharedClock) -> Self {
        Self { repo, plans, clock }
    }

    /// Current usage with elapsed periods reset. A missing row reads as
    /// zero and is created in the background; a failed read also reads as
    /// zero.
    pub async fn get_usage(&self, user_id: UserId) -> UsageQuota {
        let now = self.clock.now();

        match self.repo.find(user_id).await {
            Ok(Some(row)) => return rollover(row, now),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Usage ledger read failed, assuming zero usage");
                return UsageQuota::zeroed(user_id, now);
            }
        }

        let repo = self.repo.clone();
        tokio::spawn(async move {
            if let Err(e) = repo.create_if_absent(user_id, now).await {
                e.log();
            }
        });

        UsageQuota::zeroed(user_id, now)
    }

    /// Atomically add `delta` to the user's counters.
    pub async fn increment_usage(&self, user_id: UserId, delta: UsageDelta) -> QuotaResult<UsageQuota> {
        let plan = self.resolve_plan(user_id).await;
        self.repo
            .increment(user_id, delta, plan.daily_request_quota, self.clock.now())
            .await
    }

    pub async fn check_quota(&self, user_id: UserId, plan: &PlanQuota) -> QuotaDecision {
        let usage = self.get_usage(user_id).await;
        evaluate(&usage, plan)
    }

    /// Plan for `user_id`; lookup failure or a missing row yields Free.
    pub async fn resolve_plan(&self, user_id: UserId) -> PlanQuota {
        match self.plans.plan_for(user_id).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "No plan assigned, using free plan");
                PlanQuota::free()
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Plan lookup failed, using free plan");
                PlanQuota::free()
            }
        }
    }

    /// Gate one metered operation: `Ok` to proceed, quota errors otherwise.
    pub async fn enforce(&self, user_id: UserId) -> QuotaResult<PlanQuota> {
        let plan = self.resolve_plan(user_id).await;
        match self.check_quota(user_id, &plan).await {
            QuotaDecision::Pass => Ok(plan),
            QuotaDecision::DailyExceeded { quota } => {
                tracing::warn!(user_id = %user_id, quota, plan = %plan.plan_name, "Daily quota exceeded");
                Err(QuotaError::DailyQuotaExceeded { quota })
            }
            QuotaDecision::MonthlyExceeded { quota } => {
                tracing::warn!(user_id = %user_id, quota, plan = %plan.plan_name, "Monthly token quota exceeded");
                Err(QuotaError::MonthlyTokenQuotaExceeded { quota })
            }
        }
    }

    pub async fn usage_report(&self, user_id: UserId) -> UsageReport {
        let usage = self.get_usage(user_id).await;
        let plan = self.resolve_plan(user_id).await;
        let report = report(usage, plan, self.clock.now());

        tracing::info!(
            user_id = %user_id,
            remaining = report.rate_limit_remaining,
            daily = report.daily_request_quota,
            "Usage report served"
        );
        report
    }
}

//! AI Usage Quotas
//!
//! Clean Architecture structure:
//! - `domain/` - Usage rows, plans, period rollover, quota evaluation
//! - `application/` - Quota ledger, config
//! - `infra/` - PostgreSQL and in-process repositories
//! - `presentation/` - Quota guard middleware, usage report endpoint
//!
//! ## Quota Model
//! - Daily request quota and monthly token quota per plan
//! - Checked before the metered operation, charged after it succeeds
//! - Missing or unreadable plans fall back to the Free plan

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::QuotaConfig;
pub use application::ledger::QuotaLedger;
pub use domain::entities::{
    FREE_DAILY_REQUESTS, FREE_MONTHLY_TOKENS, FREE_PLAN_NAME, PlanQuota, QuotaDecision,
    UsageDelta, UsageQuota, UsageReport,
};
pub use domain::repository::{LedgerRepository, PlanLookup};
pub use error::{QuotaError, QuotaResult};
pub use infra::memory::{MemoryLedger, MemoryPlanLookup};
pub use infra::postgres::PgQuotaRepository;
pub use presentation::middleware::{QuotaGuardState, TokensUsed};
pub use presentation::router::{metered, usage_router};

/// Ledger backed by PostgreSQL for both usage and plans.
pub type PgQuotaLedger = QuotaLedger<PgQuotaRepository, PgQuotaRepository>;

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

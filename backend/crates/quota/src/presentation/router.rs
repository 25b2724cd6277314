//! Router Configuration

use crate::application::ledger::QuotaLedger;
use crate::domain::repository::{LedgerRepository, PlanLookup};
use crate::presentation::handlers::usage;
use crate::presentation::middleware::{QuotaGuardState, enforce_quota};
use axum::{Router, middleware, routing::get};
use std::sync::Arc;

/// Usage report routes, mounted under `/api/v1/ai`.
pub fn usage_router<L, P>(ledger: Arc<QuotaLedger<L, P>>) -> Router
where
    L: LedgerRepository + Send + Sync + 'static,
    P: PlanLookup + Send + Sync + 'static,
{
    Router::new()
        .route("/usage", get(usage::<L, P>))
        .with_state(ledger)
}

/// Put `metered` routes behind the quota guard.
pub fn metered<L, P>(metered: Router, state: QuotaGuardState<L, P>) -> Router
where
    L: LedgerRepository + Send + Sync + 'static,
    P: PlanLookup + Send + Sync + 'static,
{
    metered.layer(middleware::from_fn_with_state(state, enforce_quota::<L, P>))
}

//! HTTP Handlers

use crate::application::ledger::QuotaLedger;
use crate::domain::entities::UsageReport;
use crate::domain::repository::{LedgerRepository, PlanLookup};
use crate::error::{QuotaError, QuotaResult};
use axum::extract::State;
use axum::{Extension, Json};
use ratelimit::AuthenticatedSubject;
use std::sync::Arc;

/// GET /api/v1/ai/usage
pub async fn usage<L, P>(
    State(ledger): State<Arc<QuotaLedger<L, P>>>,
    subject: Option<Extension<AuthenticatedSubject>>,
) -> QuotaResult<Json<UsageReport>>
where
    L: LedgerRepository + Send + Sync + 'static,
    P: PlanLookup + Send + Sync + 'static,
{
    let Some(Extension(AuthenticatedSubject(user_id))) = subject else {
        return Err(QuotaError::AuthenticationRequired);
    };
    Ok(Json(ledger.usage_report(user_id).await))
}

//! Quota Guard Middleware
//!
//! Wraps metered routes: the quota is checked before the handler runs and
//! the ledger is charged after a successful response.

use crate::application::ledger::QuotaLedger;
use crate::domain::entities::UsageDelta;
use crate::domain::repository::{LedgerRepository, PlanLookup};
use crate::error::QuotaError;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ratelimit::AuthenticatedSubject;
use std::sync::Arc;

/// Response extension set by a metered handler to report tokens consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokensUsed(pub i64);

pub struct QuotaGuardState<L, P> {
    pub ledger: Arc<QuotaLedger<L, P>>,
    pub enabled: bool,
}

impl<L, P> Clone for QuotaGuardState<L, P> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            enabled: self.enabled,
        }
    }
}

pub async fn enforce_quota<L, P>(
    State(state): State<QuotaGuardState<L, P>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    L: LedgerRepository + Send + Sync + 'static,
    P: PlanLookup + Send + Sync + 'static,
{
    if !state.enabled {
        return next.run(req).await;
    }

    let Some(user_id) = req
        .extensions()
        .get::<AuthenticatedSubject>()
        .map(|subject| subject.0)
    else {
        return QuotaError::AuthenticationRequired.into_response();
    };

    if let Err(e) = state.ledger.enforce(user_id).await {
        return e.into_response();
    }

    let response = next.run(req).await;

    if response.status().as_u16() < 400 {
        let tokens = response.extensions().get::<TokensUsed>().map_or(0, |t| t.0);
        // The operation already ran; a failed charge is logged, not surfaced
        if let Err(e) = state
            .ledger
            .increment_usage(user_id, UsageDelta::request(tokens))
            .await
        {
            e.log();
        }
    }

    response
}

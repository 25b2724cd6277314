//! Monitoring Router

use crate::application::monitor::Monitor;
use crate::presentation::handlers;
use axum::{Router, routing::get};
use std::sync::Arc;

/// Routes mounted under `/api/v1/monitoring`
pub fn monitoring_router(monitor: Arc<Monitor>) -> Router {
    Router::new()
        .route("/violations", get(handlers::violation_stats))
        .route("/suspicious", get(handlers::suspicious_activity))
        .route("/security", get(handlers::security_summary))
        .with_state(monitor)
}

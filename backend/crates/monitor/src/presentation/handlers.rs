//! HTTP Handlers
//!
//! Read-only views over the monitor buffers.

use crate::application::monitor::Monitor;
use crate::domain::entities::{RateLimitStats, SecuritySummary, Timeframe};
use crate::error::{MonitorError, MonitorResult};
use crate::presentation::dto::{SecurityQuery, SuspiciousQuery, SuspiciousResponse, ViolationsQuery};
use axum::Json;
use axum::extract::{Query, State};
use std::sync::Arc;

pub const MAX_SUMMARY_HOURS: u32 = 168;

/// GET /api/v1/monitoring/violations
pub async fn violation_stats(
    State(monitor): State<Arc<Monitor>>,
    Query(query): Query<ViolationsQuery>,
) -> MonitorResult<Json<RateLimitStats>> {
    let timeframe = match query.timeframe.as_deref() {
        None => Timeframe::default(),
        Some(raw) => raw.parse().map_err(MonitorError::InvalidQuery)?,
    };
    Ok(Json(monitor.get_rate_limit_stats(timeframe)?))
}

/// GET /api/v1/monitoring/suspicious
pub async fn suspicious_activity(
    State(monitor): State<Arc<Monitor>>,
    Query(query): Query<SuspiciousQuery>,
) -> MonitorResult<Json<SuspiciousResponse>> {
    let threshold = match query.threshold.as_deref() {
        None => monitor.config().suspicious_threshold,
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            MonitorError::InvalidQuery(format!("threshold '{}' is not a non-negative integer", raw))
        })?,
    };

    let activity = monitor.get_suspicious_activity(threshold)?;
    Ok(Json(SuspiciousResponse {
        threshold,
        total: activity.len(),
        activity,
    }))
}

/// GET /api/v1/monitoring/security
pub async fn security_summary(
    State(monitor): State<Arc<Monitor>>,
    Query(query): Query<SecurityQuery>,
) -> MonitorResult<Json<SecuritySummary>> {
    let hours = match query.hours.as_deref() {
        None => 24,
        Some(raw) => parse_hours(raw)?,
    };
    Ok(Json(monitor.get_security_summary(hours)?))
}

fn parse_hours(raw: &str) -> MonitorResult<u32> {
    match raw.trim().parse::<u32>() {
        Ok(h) if (1..=MAX_SUMMARY_HOURS).contains(&h) => Ok(h),
        _ => Err(MonitorError::InvalidQuery(format!(
            "hours must be between 1 and {}",
            MAX_SUMMARY_HOURS
        ))),
    }
}

//! API DTOs (Data Transfer Objects)

use crate::domain::entities::SuspiciousActivity;
use serde::{Deserialize, Serialize};

/// Query for GET /api/v1/monitoring/violations
#[derive(Debug, Default, Deserialize)]
pub struct ViolationsQuery {
    pub timeframe: Option<String>,
}

/// Query for GET /api/v1/monitoring/suspicious
#[derive(Debug, Default, Deserialize)]
pub struct SuspiciousQuery {
    pub threshold: Option<String>,
}

/// Query for GET /api/v1/monitoring/security
#[derive(Debug, Default, Deserialize)]
pub struct SecurityQuery {
    pub hours: Option<String>,
}

/// Response for GET /api/v1/monitoring/suspicious
#[derive(Debug, Serialize)]
pub struct SuspiciousResponse {
    pub threshold: u32,
    pub total: usize,
    pub activity: Vec<SuspiciousActivity>,
}

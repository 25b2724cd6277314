//! API DTOs (Data Transfer Objects)

use serde::Serialize;

pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

/// 429 body
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitExceededBody {
    pub error: &'static str,
    pub message: String,
    pub limit: u32,
    pub window_seconds: u64,
    pub retry_after: u64,
    pub reset_at: i64,
}

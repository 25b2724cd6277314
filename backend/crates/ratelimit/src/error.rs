//! Rate Limit Error Types
//!
//! Counter-store failures never reach a client: the store façade absorbs
//! them and admits, so these variants are only ever logged.

use std::time::Duration;
use thiserror::Error;

pub type RateLimitResult<T> = Result<T, RateLimitError>;

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Shared store command or connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Backend exceeded the per-call deadline
    #[error("Counter store timed out after {0:?}")]
    Timeout(Duration),

    /// Backend reply could not be interpreted
    #[error("Malformed counter reply: {0}")]
    MalformedReply(String),

    /// Any other backend failure
    #[error("Counter backend error: {0}")]
    Backend(String),
}

impl RateLimitError {
    pub(crate) fn log(&self, op: &'static str, backend: &'static str) {
        match self {
            RateLimitError::Timeout(_) => {
                tracing::warn!(op, backend, error = %self, "Counter store slow, failing open")
            }
            _ => tracing::error!(op, backend, error = %self, "Counter store error, failing open"),
        }
    }
}

//! Monitor Error Types
//!
//! Monitor-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Retention arithmetic fell outside the representable time range
    #[error("Clock value out of range")]
    ClockOutOfRange,

    /// Bad query parameter on a monitoring endpoint
    #[error("Invalid query parameter: {0}")]
    InvalidQuery(String),
}

impl MonitorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MonitorError::InvalidQuery(_) => ErrorKind::BadRequest,
            MonitorError::ClockOutOfRange => ErrorKind::InternalServerError,
        }
    }

    fn log(&self) {
        match self {
            MonitorError::InvalidQuery(_) => tracing::debug!(error = %self, "Monitor query rejected"),
            _ => tracing::error!(error = %self, "Monitor internal error"),
        }
    }
}

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

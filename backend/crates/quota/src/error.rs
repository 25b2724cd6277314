//! Quota Error Types
//!
//! Quota-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

pub type QuotaResult<T> = Result<T, QuotaError>;

pub const DAILY_QUOTA_EXCEEDED: &str = "DAILY_QUOTA_EXCEEDED";
pub const MONTHLY_TOKEN_QUOTA_EXCEEDED: &str = "MONTHLY_TOKEN_QUOTA_EXCEEDED";

#[derive(Debug, Error)]
pub enum QuotaError {
    // ========================================================================
    // Quota Errors
    // ========================================================================
    #[error("You have reached your daily request quota ({quota}).")]
    DailyQuotaExceeded { quota: i64 },

    #[error("You have reached your monthly token quota ({quota}).")]
    MonthlyTokenQuotaExceeded { quota: i64 },

    // ========================================================================
    // Access Errors
    // ========================================================================
    #[error("Authentication required")]
    AuthenticationRequired,

    // ========================================================================
    // Infrastructure Errors
    // ========================================================================
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger store error: {0}")]
    Store(String),
}

impl QuotaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuotaError::DailyQuotaExceeded { .. } | QuotaError::MonthlyTokenQuotaExceeded { .. } => {
                ErrorKind::TooManyRequests
            }
            QuotaError::AuthenticationRequired => ErrorKind::Unauthorized,
            QuotaError::Database(_) | QuotaError::Store(_) => ErrorKind::ServiceUnavailable,
        }
    }

    /// Machine code rendered as the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            QuotaError::DailyQuotaExceeded { .. } => DAILY_QUOTA_EXCEEDED,
            QuotaError::MonthlyTokenQuotaExceeded { .. } => MONTHLY_TOKEN_QUOTA_EXCEEDED,
            _ => self.kind().default_code(),
        }
    }

    pub(crate) fn log(&self) {
        match self {
            QuotaError::DailyQuotaExceeded { quota } => {
                tracing::info!(quota, "Daily request quota exhausted")
            }
            QuotaError::MonthlyTokenQuotaExceeded { quota } => {
                tracing::info!(quota, "Monthly token quota exhausted")
            }
            QuotaError::AuthenticationRequired => tracing::debug!("Quota check without subject"),
            QuotaError::Database(e) => tracing::error!(error = %e, "Usage ledger database error"),
            QuotaError::Store(e) => tracing::error!(error = %e, "Usage ledger store error"),
        }
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        match err {
            // Database details stay in the logs
            QuotaError::Database(e) => AppError::service_unavailable("Usage ledger unavailable")
                .with_source(e),
            QuotaError::Store(_) => AppError::service_unavailable("Usage ledger unavailable"),
            other => {
                let code = other.code();
                AppError::new(other.kind(), other.to_string()).with_code(code)
            }
        }
    }
}

impl IntoResponse for QuotaError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

//! Violation / Security Monitor
//!
//! Clean Architecture structure:
//! - `domain/` - Records, bounded buffers, aggregation
//! - `application/` - The owned `Monitor` instance, config, background maintenance
//! - `presentation/` - Read-only monitoring endpoints and request validation middleware
//!
//! ## Model
//! - Rate limit violations and security events live in two independent
//!   bounded buffers (FIFO eviction past a cap, time-based purge past 24h)
//! - Nothing is persisted beyond process lifetime
//! - Suspicious activity reports are advisory: nothing is blocked from them

pub mod application;
pub mod domain;
pub mod error;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{MonitorConfig, SecurityValidationConfig};
pub use application::maintenance::{MaintenanceTask, Sweep};
pub use application::monitor::Monitor;
pub use domain::entities::{
    Metadata, SecurityEvent, SecurityEventReport, Severity, ViolationRecord, ViolationReport,
};
pub use error::{MonitorError, MonitorResult};
pub use presentation::router::monitoring_router;

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

//! Adaptive Rate Limiting
//!
//! Clean Architecture structure:
//! - `domain/` - Policy classes, keys, counter contract, classifier
//! - `application/` - Fail-open counter store, sliding-window limiter, config
//! - `infra/` - Redis and in-process counter backends
//! - `presentation/` - Admission and trusted-subject middleware
//!
//! ## Admission Model
//! - Sliding-window log: every admitted request's timestamp is kept per
//!   `(policy class, subject)` key and counted over the trailing window
//! - The `limit`-th request in a window is admitted, the next one rejected;
//!   rejected attempts are not recorded
//! - Counter store errors and timeouts admit the request (fail-open)
//! - Unclassified requests are not rate limited

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{PolicyTable, RateLimitConfig};
pub use application::counter_store::CounterStore;
pub use application::limiter::WindowLimiter;
pub use domain::entities::{Admission, PolicyClass, RateLimitInfo, RateLimitPolicy, WindowSnapshot};
pub use domain::repository::CounterBackend;
pub use domain::value_objects::{AuthenticatedSubject, RateLimitKey, Subject};
pub use error::{RateLimitError, RateLimitResult};
pub use infra::memory::MemoryCounterBackend;
pub use infra::redis_store::RedisCounterBackend;
pub use infra::selected::SelectedBackend;

/// Limiter over whichever backend configuration selected.
pub type RateLimiter = WindowLimiter<SelectedBackend>;

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

#[cfg(test)]
mod tests;

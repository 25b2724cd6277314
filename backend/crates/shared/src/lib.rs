//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the vocabulary every backend crate agrees on:
//! - The unified error type and its HTTP classification
//! - Typed identifiers for subjects (users)
//!
//! Only things with the same meaning in the rate limiter, the quota
//! ledger and the monitor belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;

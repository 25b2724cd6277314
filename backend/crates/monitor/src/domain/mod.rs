//! Domain Layer
//!
//! - Record types for violations and security events
//! - The bounded rolling buffer
//! - Pure aggregation over buffered records

pub mod buffer;
pub mod entities;
pub mod services;

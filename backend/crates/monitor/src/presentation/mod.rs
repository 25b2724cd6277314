//! Presentation Layer
//!
//! Monitoring endpoints and the security validation middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

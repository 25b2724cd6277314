//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Client identification (socket peer, or forwarded address from trusted proxies)
//! - Environment-driven configuration helpers
//! - Wall clock abstraction with a controllable test clock

pub mod client;
pub mod clock;
pub mod config;

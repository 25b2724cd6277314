//! Application Layer

pub mod config;
pub mod counter_store;
pub mod limiter;

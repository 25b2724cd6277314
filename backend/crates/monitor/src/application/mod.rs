//! Application Layer

pub mod config;
pub mod maintenance;
pub mod monitor;

//! Infrastructure Layer
//!
//! Counter backends: shared (Redis) and in-process (concurrent map).

pub mod memory;
pub mod redis_store;
pub mod selected;

//! Domain Layer
//!
//! - Policy classes, policies and counter snapshots
//! - Subject and key value objects
//! - The counter backend contract
//! - Classification and window arithmetic

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;

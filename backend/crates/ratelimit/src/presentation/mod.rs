//! Presentation Layer
//!
//! Admission and trusted-subject middleware, rejection body.

pub mod dto;
pub mod middleware;

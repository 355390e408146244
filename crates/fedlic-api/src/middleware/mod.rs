//! # Middleware Modules
//!
//! Tower middleware layers for the API service.

pub mod enforcement;
pub mod metrics;

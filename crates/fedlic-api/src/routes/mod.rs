//! # API Route Modules

pub mod license;

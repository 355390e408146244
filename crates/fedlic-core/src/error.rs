//! # Error Hierarchy
//!
//! Structured error types shared by the workspace, built with `thiserror`.
//!
//! Note that license *outcomes* (expired, overflowing, badly signed) are not
//! errors: they are [`Violation`](crate::Violation) values. The errors here
//! describe failures to even produce such an outcome.

use thiserror::Error;

/// Top-level error type for fedlic core operations.
#[derive(Error, Debug)]
pub enum FedlicError {
    /// Canonicalization failure while preparing a signing payload.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value did not satisfy a domain constraint.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

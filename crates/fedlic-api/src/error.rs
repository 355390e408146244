//! # Application Error
//!
//! Maps store and reconciliation failures to structured HTTP responses.
//! Server-side details are logged, never returned to the caller.
//!
//! License content problems are not errors here: a rejected record is a
//! `200` carrying the violation in its status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fedlic_reconciler::{ReconcileError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// The store or a count source is temporarily unreachable, or kept
    /// conflicting with concurrent writers.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::Transport(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Store(e) => e.into(),
            other if other.is_retryable() => Self::Unavailable(other.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service temporarily unavailable",
            ),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error"),
        };
        tracing::error!(error = %self, status = status.as_u16(), "request failed");
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": message,
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

//! Store and reconciliation errors.
//!
//! Whether a failed reconciliation is retried is decided here, by
//! [`ReconcileError::is_retryable`]. Verification and policy outcomes are
//! never errors: they end up in the persisted status as a `Violation`.

use fedlic_aggregator::AggregatorError;
use fedlic_core::RecordKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("license object {0} not found")]
    NotFound(RecordKey),

    /// A conditional write carried a stale resource version.
    #[error("conflict writing {key}: expected version {expected}, found {actual}")]
    Conflict {
        key: RecordKey,
        expected: u64,
        actual: u64,
    },

    /// The backing store could not be reached.
    #[error("store transport error: {0}")]
    Transport(String),

    /// A stored object could not be encoded or decoded.
    #[error("store codec error: {0}")]
    Codec(String),

    #[error("store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Resource counts could not be obtained.
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
}

impl ReconcileError {
    /// Transient failures are retried with backoff; anything else is
    /// terminal for this trigger.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(StoreError::Conflict { .. })
            | Self::Store(StoreError::Transport(_))
            | Self::Store(StoreError::Io { .. }) => true,
            Self::Store(StoreError::NotFound(_)) | Self::Store(StoreError::Codec(_)) => false,
            Self::Aggregator(AggregatorError::Config(_)) => false,
            Self::Aggregator(_) => true,
        }
    }
}

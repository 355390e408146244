//! Aggregation errors.
//!
//! Per-cluster errors never abort a cycle: the failing cluster is logged and
//! left out of that cycle's snapshot.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    /// The cluster registry could not be read.
    #[error("cluster registry error: {0}")]
    Registry(String),

    /// No client could be built for a cluster.
    #[error("cannot connect to cluster {cluster:?}: {message}")]
    Connect { cluster: String, message: String },

    /// The cluster's node listing failed.
    #[error("listing nodes of cluster {cluster:?} failed: {message}")]
    List { cluster: String, message: String },

    /// The cluster did not answer within the per-call timeout.
    #[error("listing nodes of cluster {cluster:?} timed out after {after:?}")]
    Timeout { cluster: String, after: Duration },

    #[error("invalid aggregator configuration: {0}")]
    Config(String),
}

//! Aggregator configuration.

use std::time::Duration;

use crate::error::AggregatorError;

/// Cadence and per-cluster time bound of the aggregation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Interval between cycles (default: 60 seconds). The first cycle runs
    /// immediately.
    pub period: Duration,
    /// Upper bound on one cluster's node listing (default: 10 seconds).
    pub cluster_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            cluster_timeout: Duration::from_secs(10),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), AggregatorError> {
        if self.period.is_zero() {
            return Err(AggregatorError::Config("period must be non-zero".into()));
        }
        if self.cluster_timeout.is_zero() {
            return Err(AggregatorError::Config(
                "cluster timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

//! Where resource counts come from.
//!
//! A standalone deployment lists its own nodes and counts them all as the
//! host cluster. A federation host reads the aggregator's snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fedlic_aggregator::{AggregatorError, ClusterResourceAggregator, ClusterSnapshot, NodeLister};
use fedlic_core::ResourceCounts;

use crate::error::ReconcileError;

#[async_trait]
pub trait CountSource: Send + Sync {
    /// Counts for a reconciliation.
    async fn counts(&self) -> Result<ResourceCounts, ReconcileError>;

    /// Counts for an on-demand evaluation that cannot rely on a previous
    /// background cycle.
    async fn live_counts(&self) -> Result<ResourceCounts, ReconcileError> {
        self.counts().await
    }
}

/// Local nodes only; `clusterNum` is always 1.
pub struct LocalCounts {
    lister: Arc<dyn NodeLister>,
    timeout: Duration,
}

impl LocalCounts {
    pub fn new(lister: Arc<dyn NodeLister>, timeout: Duration) -> Self {
        Self { lister, timeout }
    }
}

#[async_trait]
impl CountSource for LocalCounts {
    async fn counts(&self) -> Result<ResourceCounts, ReconcileError> {
        let nodes = tokio::time::timeout(self.timeout, self.lister.list_nodes())
            .await
            .map_err(|_| AggregatorError::Timeout {
                cluster: "local".to_string(),
                after: self.timeout,
            })??;
        let mut counts = ClusterSnapshot::host_only(&nodes).counts();
        counts.cluster_num = 1;
        Ok(counts)
    }
}

/// The aggregator's host/member split.
pub struct FederatedCounts {
    aggregator: Arc<ClusterResourceAggregator>,
}

impl FederatedCounts {
    pub fn new(aggregator: Arc<ClusterResourceAggregator>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl CountSource for FederatedCounts {
    async fn counts(&self) -> Result<ResourceCounts, ReconcileError> {
        Ok(self.aggregator.counts())
    }

    /// Runs a cycle first if none has completed yet.
    async fn live_counts(&self) -> Result<ResourceCounts, ReconcileError> {
        if !self.aggregator.is_primed() {
            self.aggregator.collect_now().await;
        }
        Ok(self.aggregator.counts())
    }
}

/// Fixed counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCounts(pub ResourceCounts);

#[async_trait]
impl CountSource for StaticCounts {
    async fn counts(&self) -> Result<ResourceCounts, ReconcileError> {
        Ok(self.0)
    }
}

//! Node listing collaborators.
//!
//! A [`NodeLister`] lists one cluster's nodes. A [`ClusterConnector`] builds
//! a lister from a registry entry; the aggregator caches what it returns.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AggregatorError;
use crate::registry::ClusterInfo;
use crate::snapshot::NodeRecord;

#[async_trait]
pub trait NodeLister: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, AggregatorError>;
}

pub trait ClusterConnector: Send + Sync {
    fn connect(&self, cluster: &ClusterInfo) -> Result<Arc<dyn NodeLister>, AggregatorError>;
}

/// A lister over a fixed node list.
#[derive(Debug, Clone, Default)]
pub struct StaticNodeLister {
    nodes: Vec<NodeRecord>,
}

impl StaticNodeLister {
    pub fn new(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeLister for StaticNodeLister {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, AggregatorError> {
        Ok(self.nodes.clone())
    }
}

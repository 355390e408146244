//! # fedlic-aggregator — Cross-Cluster Resource Aggregation
//!
//! Periodically counts nodes and CPU cores across a federation of clusters
//! and publishes the result for the reconciler to evaluate.
//!
//! - [`ClusterResourceAggregator`]: the cancellable background loop, the
//!   two-generation snapshot published through `ArcSwap`, and the
//!   coalescing change channel.
//! - [`ClusterRegistry`] / [`FileClusterRegistry`]: which member clusters
//!   exist and how to reach them.
//! - [`NodeLister`] / [`KubeNodeLister`]: how one cluster's nodes are
//!   listed, and [`ClientCache`] for reusing listers across cycles.
//!
//! ## Crate Policy
//!
//! - The request path never calls into remote clusters: readers only load
//!   the published snapshot.
//! - A failing cluster is omitted, never carried forward from a previous
//!   cycle. Counts err on the low side.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod kube;
pub mod lister;
pub mod registry;
pub mod snapshot;

pub use aggregator::{
    change_channel, ChangeEvent, ClusterResourceAggregator, CHANGE_CHANNEL_CAPACITY,
};
pub use cache::ClientCache;
pub use config::AggregatorConfig;
pub use error::AggregatorError;
pub use kube::{parse_cpu_quantity, KubeConnector, KubeNodeLister};
pub use lister::{ClusterConnector, NodeLister, StaticNodeLister};
pub use registry::{
    ClusterConnection, ClusterInfo, ClusterRegistry, FileClusterRegistry, StaticClusterRegistry,
};
pub use snapshot::{
    node_set, ClusterInfoView, ClusterNodeFact, ClusterSnapshot, Generations, NodeFact, NodeRecord,
    NodeSet, HOST_CLUSTER,
};

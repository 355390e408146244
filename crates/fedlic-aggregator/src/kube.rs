//! # Kubernetes Node Lister
//!
//! Lists nodes through a Kubernetes-style API server: `GET {base}/api/v1/nodes`
//! returning a `NodeList`. Only three fields are read per node:
//!
//! - `metadata.name`
//! - `spec.unschedulable` (absent means schedulable)
//! - `status.capacity.cpu`, a quantity such as `"8"`, `"3500m"` or `"2.5"`;
//!   fractional cores are truncated.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::AggregatorError;
use crate::lister::{ClusterConnector, NodeLister};
use crate::registry::{ClusterConnection, ClusterInfo};
use crate::snapshot::NodeRecord;

const NODES_PATH: &str = "api/v1/nodes";

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct Node {
    metadata: NodeMetadata,
    #[serde(default)]
    spec: NodeSpec,
    #[serde(default)]
    status: NodeStatus,
}

#[derive(Debug, Deserialize)]
struct NodeMetadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodeSpec {
    #[serde(default)]
    unschedulable: bool,
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    capacity: NodeCapacity,
}

#[derive(Debug, Default, Deserialize)]
struct NodeCapacity {
    #[serde(default)]
    cpu: Option<String>,
}

/// Parse a CPU quantity into whole cores.
///
/// Accepts plain integers, decimals and millicore (`m`) suffixed values.
pub fn parse_cpu_quantity(quantity: &str) -> Option<u64> {
    let q = quantity.trim();
    if let Some(milli) = q.strip_suffix('m') {
        return milli.parse::<u64>().ok().map(|m| m / 1000);
    }
    if let Ok(whole) = q.parse::<u64>() {
        return Some(whole);
    }
    let (int, frac) = q.split_once('.')?;
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if int.is_empty() {
        return Some(0);
    }
    int.parse().ok()
}

/// Lists nodes of one cluster over HTTP.
#[derive(Clone)]
pub struct KubeNodeLister {
    cluster: String,
    http: reqwest::Client,
    nodes_url: Url,
    token: Option<String>,
}

impl std::fmt::Debug for KubeNodeLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeNodeLister")
            .field("cluster", &self.cluster)
            .field("nodes_url", &self.nodes_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl KubeNodeLister {
    /// Build a lister for `cluster` from its connection details. `timeout`
    /// bounds each HTTP request.
    pub fn new(
        cluster: impl Into<String>,
        connection: &ClusterConnection,
        timeout: Duration,
    ) -> Result<Self, AggregatorError> {
        let cluster = cluster.into();
        let connect_err = |message: String| AggregatorError::Connect {
            cluster: cluster.clone(),
            message,
        };
        let mut base = Url::parse(&connection.url)
            .map_err(|e| connect_err(format!("invalid URL {:?}: {e}", connection.url)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let nodes_url = base
            .join(NODES_PATH)
            .map_err(|e| connect_err(format!("invalid URL {:?}: {e}", connection.url)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(connection.insecure_skip_tls_verify)
            .build()
            .map_err(|e| connect_err(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            cluster,
            http,
            nodes_url,
            token: connection.token.clone(),
        })
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    fn list_err(&self, message: String) -> AggregatorError {
        AggregatorError::List {
            cluster: self.cluster.clone(),
            message,
        }
    }
}

#[async_trait]
impl NodeLister for KubeNodeLister {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, AggregatorError> {
        let mut request = self.http.get(self.nodes_url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| self.list_err(format!("request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.list_err(format!("HTTP {status}: {body}")));
        }
        let list: NodeList = resp
            .json()
            .await
            .map_err(|e| self.list_err(format!("invalid NodeList: {e}")))?;

        let mut nodes = Vec::with_capacity(list.items.len());
        for node in list.items {
            let cores = match node.status.capacity.cpu.as_deref() {
                None => 0,
                Some(raw) => parse_cpu_quantity(raw).ok_or_else(|| {
                    self.list_err(format!(
                        "node {:?} has invalid cpu capacity {raw:?}",
                        node.metadata.name
                    ))
                })?,
            };
            nodes.push(NodeRecord::new(
                node.metadata.name,
                !node.spec.unschedulable,
                cores,
            ));
        }
        Ok(nodes)
    }
}

/// Connects to member clusters with [`KubeNodeLister`].
#[derive(Debug, Clone)]
pub struct KubeConnector {
    request_timeout: Duration,
}

impl KubeConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl ClusterConnector for KubeConnector {
    fn connect(&self, cluster: &ClusterInfo) -> Result<Arc<dyn NodeLister>, AggregatorError> {
        let lister = KubeNodeLister::new(&cluster.name, &cluster.connection, self.request_timeout)?;
        Ok(Arc::new(lister))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_quantities() {
        assert_eq!(parse_cpu_quantity("8"), Some(8));
        assert_eq!(parse_cpu_quantity(" 16 "), Some(16));
        assert_eq!(parse_cpu_quantity("3500m"), Some(3));
        assert_eq!(parse_cpu_quantity("500m"), Some(0));
        assert_eq!(parse_cpu_quantity("2.5"), Some(2));
        assert_eq!(parse_cpu_quantity(".5"), Some(0));
        assert_eq!(parse_cpu_quantity("four"), None);
        assert_eq!(parse_cpu_quantity("1.x"), None);
        assert_eq!(parse_cpu_quantity("-1"), None);
    }

    #[test]
    fn nodes_url_is_joined_under_base_path() {
        let conn = ClusterConnection::new("https://api.example:6443/proxy/east");
        let lister = KubeNodeLister::new("east", &conn, Duration::from_secs(1)).unwrap();
        assert_eq!(
            lister.nodes_url.as_str(),
            "https://api.example:6443/proxy/east/api/v1/nodes"
        );
    }

    #[test]
    fn invalid_url_is_a_connect_error() {
        let conn = ClusterConnection::new("not a url");
        let err = KubeNodeLister::new("east", &conn, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, AggregatorError::Connect { .. }));
    }
}

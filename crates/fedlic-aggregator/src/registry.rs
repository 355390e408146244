//! # Cluster Registry
//!
//! The registry tells the aggregator which member clusters exist, whether
//! each is ready, and how to reach it. It is consulted at the start of every
//! cycle, so clusters joining or leaving the federation are picked up
//! without a restart.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fedlic_core::CanonicalBytes;
use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;

/// How to reach a member cluster's node API.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConnection {
    /// Base URL of the cluster API server.
    pub url: String,
    /// Bearer token, if the API requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl ClusterConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Digest of the connection details. A cached client is reused only
    /// while this stays the same.
    pub fn fingerprint(&self) -> Result<String, AggregatorError> {
        let canonical = CanonicalBytes::new(self)
            .map_err(|e| AggregatorError::Config(format!("cannot fingerprint connection: {e}")))?;
        Ok(fedlic_crypto::sha256_hex(&canonical))
    }
}

impl fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

/// A registered member cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub name: String,
    /// Clusters that are not ready are skipped for the cycle.
    #[serde(default = "default_ready")]
    pub ready: bool,
    #[serde(flatten)]
    pub connection: ClusterConnection,
}

fn default_ready() -> bool {
    true
}

impl ClusterInfo {
    pub fn new(name: impl Into<String>, connection: ClusterConnection) -> Self {
        Self {
            name: name.into(),
            ready: true,
            connection,
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }
}

/// Source of the member-cluster list.
#[async_trait]
pub trait ClusterRegistry: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, AggregatorError>;
}

/// A fixed cluster list.
#[derive(Debug, Clone, Default)]
pub struct StaticClusterRegistry {
    clusters: Vec<ClusterInfo>,
}

impl StaticClusterRegistry {
    pub fn new(clusters: Vec<ClusterInfo>) -> Self {
        Self { clusters }
    }
}

#[async_trait]
impl ClusterRegistry for StaticClusterRegistry {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, AggregatorError> {
        Ok(self.clusters.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClusterFile {
    #[serde(default)]
    clusters: Vec<ClusterInfo>,
}

/// Reads the cluster list from a YAML (or JSON) file on every call.
///
/// ```yaml
/// clusters:
///   - name: east
///     url: https://east.example:6443
///     token: "..."
///   - name: west
///     ready: false
///     url: https://west.example:6443
/// ```
#[derive(Debug, Clone)]
pub struct FileClusterRegistry {
    path: PathBuf,
}

impl FileClusterRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ClusterRegistry for FileClusterRegistry {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, AggregatorError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AggregatorError::Registry(format!("cannot read {}: {e}", self.path.display()))
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let file: ClusterFile = serde_yaml::from_str(&raw).map_err(|e| {
            AggregatorError::Registry(format!("cannot parse {}: {e}", self.path.display()))
        })?;
        Ok(file.clusters)
    }
}

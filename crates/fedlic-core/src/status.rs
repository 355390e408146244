//! # License Status
//!
//! Derived state: the resource counts a license was evaluated against and
//! the resulting [`Violation`]. Only the reconciler recomputes it; everyone
//! else reads the last persisted or cached value.

use serde::{Deserialize, Serialize};

use crate::violation::Violation;

/// Node and core totals for one side of the federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCount {
    #[serde(default)]
    pub core_num: u64,
    #[serde(default)]
    pub node_num: u64,
}

/// Aggregated counts, split between the host cluster and member clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCounts {
    pub host: ResourceCount,
    pub member: ResourceCount,
    pub cluster_num: u64,
}

impl ResourceCounts {
    pub fn total_nodes(&self) -> u64 {
        self.host.node_num + self.member.node_num
    }

    pub fn total_cores(&self) -> u64 {
        self.host.core_num + self.member.core_num
    }
}

/// Counts plus the violation they produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatus {
    #[serde(default)]
    pub host: ResourceCount,
    #[serde(default)]
    pub member: ResourceCount,
    #[serde(default)]
    pub cluster_num: u64,
    #[serde(default)]
    pub violation: Violation,
}

impl LicenseStatus {
    pub fn new(counts: ResourceCounts, violation: Violation) -> Self {
        Self {
            host: counts.host,
            member: counts.member,
            cluster_num: counts.cluster_num,
            violation,
        }
    }

    /// The counts this status was computed from.
    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            host: self.host,
            member: self.member,
            cluster_num: self.cluster_num,
        }
    }
}

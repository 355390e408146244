//! # Cluster Snapshots
//!
//! A [`ClusterSnapshot`] maps cluster key to node name to [`NodeFact`]. The
//! empty key is the host (local) cluster. Snapshots are immutable once
//! built; each cycle builds a new one and publishes it as the current
//! generation, keeping the previous one only for diffing.
//!
//! ## Change Rule
//!
//! Two snapshots differ when a cluster or node is present in only one of
//! them, or when a node present in both has a different schedulable flag or
//! core capacity.

use std::collections::BTreeMap;
use std::sync::Arc;

use fedlic_core::{ResourceCount, ResourceCounts};
use serde::{Deserialize, Serialize};

/// Key under which the host cluster's nodes are recorded.
pub const HOST_CLUSTER: &str = "";

/// What the aggregator records about one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFact {
    pub schedulable: bool,
    pub core_capacity: u64,
}

/// A node as reported by a cluster's node listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub name: String,
    pub schedulable: bool,
    pub core_capacity: u64,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>, schedulable: bool, core_capacity: u64) -> Self {
        Self {
            name: name.into(),
            schedulable,
            core_capacity,
        }
    }

    pub fn fact(&self) -> NodeFact {
        NodeFact {
            schedulable: self.schedulable,
            core_capacity: self.core_capacity,
        }
    }
}

/// The nodes of one cluster, keyed by node name.
pub type NodeSet = BTreeMap<String, NodeFact>;

/// Build a node set from listed nodes. Later duplicates replace earlier ones.
pub fn node_set(nodes: &[NodeRecord]) -> NodeSet {
    nodes.iter().map(|n| (n.name.clone(), n.fact())).collect()
}

/// One flattened (cluster, node) fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNodeFact {
    pub cluster: String,
    pub node: String,
    pub schedulable: bool,
    pub core_capacity: u64,
}

/// Flattened view of the current generation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfoView {
    pub facts: Vec<ClusterNodeFact>,
    pub cluster_num: u64,
}

/// cluster key -> node name -> fact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterSnapshot {
    clusters: BTreeMap<String, NodeSet>,
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot holding only host-cluster nodes.
    pub fn host_only(nodes: &[NodeRecord]) -> Self {
        let mut snapshot = Self::new();
        snapshot.insert_cluster(HOST_CLUSTER, node_set(nodes));
        snapshot
    }

    pub fn insert_cluster(&mut self, cluster: impl Into<String>, nodes: NodeSet) {
        self.clusters.insert(cluster.into(), nodes);
    }

    pub fn cluster(&self, cluster: &str) -> Option<&NodeSet> {
        self.clusters.get(cluster)
    }

    pub fn clusters(&self) -> impl Iterator<Item = (&str, &NodeSet)> {
        self.clusters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct clusters, host included.
    pub fn cluster_num(&self) -> u64 {
        self.clusters.len() as u64
    }

    pub fn node_num(&self) -> usize {
        self.clusters.values().map(BTreeMap::len).sum()
    }

    /// Whether `self` differs from `previous` under the change rule.
    pub fn changed_from(&self, previous: &ClusterSnapshot) -> bool {
        self.clusters != previous.clusters
    }

    /// Host/member split of schedulable nodes and their cores.
    pub fn counts(&self) -> ResourceCounts {
        let mut counts = ResourceCounts {
            cluster_num: self.cluster_num(),
            ..Default::default()
        };
        for (cluster, nodes) in &self.clusters {
            let side = if cluster == HOST_CLUSTER {
                &mut counts.host
            } else {
                &mut counts.member
            };
            add_schedulable(side, nodes);
        }
        counts
    }

    pub fn view(&self) -> ClusterInfoView {
        let facts = self
            .clusters
            .iter()
            .flat_map(|(cluster, nodes)| {
                nodes.iter().map(move |(node, fact)| ClusterNodeFact {
                    cluster: cluster.clone(),
                    node: node.clone(),
                    schedulable: fact.schedulable,
                    core_capacity: fact.core_capacity,
                })
            })
            .collect();
        ClusterInfoView {
            facts,
            cluster_num: self.cluster_num(),
        }
    }
}

fn add_schedulable(side: &mut ResourceCount, nodes: &NodeSet) {
    for fact in nodes.values().filter(|f| f.schedulable) {
        side.node_num += 1;
        side.core_num += fact.core_capacity;
    }
}

/// Current and previous snapshot, always published together.
#[derive(Debug, Clone, Default)]
pub struct Generations {
    pub current: Arc<ClusterSnapshot>,
    pub previous: Arc<ClusterSnapshot>,
}

impl Generations {
    /// Shift `current` into `previous` and install `next`.
    pub fn advance(&self, next: ClusterSnapshot) -> Self {
        Self {
            previous: Arc::clone(&self.current),
            current: Arc::new(next),
        }
    }

    pub fn changed(&self) -> bool {
        self.current.changed_from(&self.previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(list: &[(&str, bool, u64)]) -> NodeSet {
        list.iter()
            .map(|(n, s, c)| {
                (
                    n.to_string(),
                    NodeFact {
                        schedulable: *s,
                        core_capacity: *c,
                    },
                )
            })
            .collect()
    }

    fn snapshot(clusters: &[(&str, NodeSet)]) -> ClusterSnapshot {
        let mut s = ClusterSnapshot::new();
        for (k, v) in clusters {
            s.insert_cluster(*k, v.clone());
        }
        s
    }

    #[test]
    fn identical_snapshots_are_unchanged() {
        let a = snapshot(&[("", nodes(&[("n1", true, 4)])), ("east", nodes(&[("e1", true, 8)]))]);
        let b = a.clone();
        assert!(!a.changed_from(&b));
    }

    #[test]
    fn schedulable_flip_is_a_change() {
        let a = snapshot(&[("", nodes(&[("n1", true, 4)]))]);
        let b = snapshot(&[("", nodes(&[("n1", false, 4)]))]);
        assert!(a.changed_from(&b));
    }

    #[test]
    fn capacity_change_is_a_change() {
        let a = snapshot(&[("", nodes(&[("n1", true, 4)]))]);
        let b = snapshot(&[("", nodes(&[("n1", true, 8)]))]);
        assert!(a.changed_from(&b));
    }

    #[test]
    fn added_or_removed_members_are_changes() {
        let base = snapshot(&[("", nodes(&[("n1", true, 4)]))]);
        let extra_node = snapshot(&[("", nodes(&[("n1", true, 4), ("n2", true, 4)]))]);
        let extra_cluster = snapshot(&[("", nodes(&[("n1", true, 4)])), ("east", NodeSet::new())]);
        assert!(extra_node.changed_from(&base));
        assert!(base.changed_from(&extra_node));
        assert!(extra_cluster.changed_from(&base));
    }

    #[test]
    fn counts_only_schedulable_nodes_and_split_host() {
        let s = snapshot(&[
            ("", nodes(&[("h1", true, 4), ("h2", false, 16)])),
            ("east", nodes(&[("e1", true, 8), ("e2", true, 2)])),
            ("west", nodes(&[("w1", false, 32)])),
        ]);
        let c = s.counts();
        assert_eq!(c.cluster_num, 3);
        assert_eq!(c.host, ResourceCount { node_num: 1, core_num: 4 });
        assert_eq!(c.member, ResourceCount { node_num: 2, core_num: 10 });
    }

    #[test]
    fn view_flattens_every_node() {
        let s = snapshot(&[("", nodes(&[("h1", true, 4)])), ("east", nodes(&[("e1", false, 8)]))]);
        let view = s.view();
        assert_eq!(view.cluster_num, 2);
        assert_eq!(view.facts.len(), 2);
        assert_eq!(view.facts[0].cluster, "");
        assert_eq!(view.facts[1].node, "e1");
        assert!(!view.facts[1].schedulable);
    }

    #[test]
    fn advance_keeps_two_generations() {
        let g0 = Generations::default();
        let g1 = g0.advance(snapshot(&[("", nodes(&[("n1", true, 4)]))]));
        assert!(g1.changed());
        let g2 = g1.advance((*g1.current).clone());
        assert!(!g2.changed());
        assert!(Arc::ptr_eq(&g2.previous, &g1.current));
    }
}

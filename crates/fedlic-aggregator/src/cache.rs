//! Remote client cache.
//!
//! Listers are cached per cluster name together with the fingerprint of the
//! connection details they were built from. A changed fingerprint rebuilds
//! the entry; clusters gone from the registry are evicted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::AggregatorError;
use crate::lister::{ClusterConnector, NodeLister};
use crate::registry::ClusterInfo;

struct Entry {
    fingerprint: String,
    lister: Arc<dyn NodeLister>,
}

#[derive(Default)]
pub struct ClientCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache")
            .field("clusters", &self.len())
            .finish()
    }
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached lister for `cluster`, connecting when absent or stale.
    pub fn get_or_connect(
        &self,
        cluster: &ClusterInfo,
        connector: &dyn ClusterConnector,
    ) -> Result<Arc<dyn NodeLister>, AggregatorError> {
        let fingerprint = cluster.connection.fingerprint()?;
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&cluster.name) {
            if entry.fingerprint == fingerprint {
                return Ok(Arc::clone(&entry.lister));
            }
            tracing::info!(
                cluster = %cluster.name,
                "connection details changed, rebuilding client"
            );
        }
        let lister = connector.connect(cluster)?;
        entries.insert(
            cluster.name.clone(),
            Entry {
                fingerprint,
                lister: Arc::clone(&lister),
            },
        );
        Ok(lister)
    }

    /// Drop entries for clusters not in `names`.
    pub fn retain(&self, names: &HashSet<&str>) {
        self.entries.lock().retain(|name, _| {
            let keep = names.contains(name.as_str());
            if !keep {
                tracing::debug!(cluster = %name, "evicting client of removed cluster");
            }
            keep
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lister::StaticNodeLister;
    use crate::registry::ClusterConnection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    impl ClusterConnector for CountingConnector {
        fn connect(&self, _: &ClusterInfo) -> Result<Arc<dyn NodeLister>, AggregatorError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StaticNodeLister::default()))
        }
    }

    fn cluster(name: &str, token: &str) -> ClusterInfo {
        ClusterInfo::new(name, ClusterConnection::new("http://x").with_token(token))
    }

    #[test]
    fn reuses_client_while_fingerprint_holds() {
        let cache = ClientCache::new();
        let connector = CountingConnector::default();
        let a = cache.get_or_connect(&cluster("east", "t"), &connector).unwrap();
        let b = cache.get_or_connect(&cluster("east", "t"), &connector).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_connection_rebuilds() {
        let cache = ClientCache::new();
        let connector = CountingConnector::default();
        cache.get_or_connect(&cluster("east", "t1"), &connector).unwrap();
        cache.get_or_connect(&cluster("east", "t2"), &connector).unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn retain_evicts_removed_clusters() {
        let cache = ClientCache::new();
        let connector = CountingConnector::default();
        cache.get_or_connect(&cluster("east", "t"), &connector).unwrap();
        cache.get_or_connect(&cluster("west", "t"), &connector).unwrap();
        cache.retain(&HashSet::from(["west"]));
        assert_eq!(cache.len(), 1);
        cache.get_or_connect(&cluster("west", "t"), &connector).unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }
}

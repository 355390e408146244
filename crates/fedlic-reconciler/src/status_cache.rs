//! # Status Cache
//!
//! The last evaluated [`LicenseStatus`] per record, published by the
//! reconciler and read by the enforcement filter on every request. Reads
//! are a single atomic pointer load; writers copy the table and swap it.
//!
//! A key with no entry means "unknown". Callers on the request path treat
//! unknown as compliant (fail open).

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use fedlic_core::{LicenseStatus, RecordKey, Violation};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::LicenseStore;

type Table = HashMap<RecordKey, Arc<LicenseStatus>>;

#[derive(Debug, Default)]
pub struct StatusCache {
    table: ArcSwap<Table>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RecordKey) -> Option<Arc<LicenseStatus>> {
        self.table.load().get(key).cloned()
    }

    /// The current violation of the default license object, if known.
    pub fn violation(&self) -> Option<Violation> {
        self.get(&RecordKey::default()).map(|s| s.violation.clone())
    }

    pub fn publish(&self, key: RecordKey, status: LicenseStatus) {
        let status = Arc::new(status);
        self.table.rcu(|table| {
            let mut next = Table::clone(table);
            next.insert(key.clone(), Arc::clone(&status));
            next
        });
    }

    pub fn remove(&self, key: &RecordKey) {
        self.table.rcu(|table| {
            let mut next = Table::clone(table);
            next.remove(key);
            next
        });
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed the cache from persisted statuses. Objects without a readable
    /// status are left unknown; the reconciler fills them in.
    pub async fn hydrate(&self, store: &dyn LicenseStore) -> Result<usize, StoreError> {
        let mut loaded = 0;
        for key in store.list_keys().await? {
            match store.get(&key).await? {
                Some(object) => match object.status() {
                    Some(status) => {
                        self.publish(key, status);
                        loaded += 1;
                    }
                    None => debug!(%key, "no persisted status to hydrate"),
                },
                None => warn!(%key, "listed license object vanished during hydration"),
            }
        }
        Ok(loaded)
    }
}

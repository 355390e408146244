//! Per-record async locks: at most one reconciliation per record identity
//! at a time, distinct records in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use fedlic_core::RecordKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<RecordKey, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &RecordKey) -> OwnedMutexGuard<()> {
        // Clone the Arc out so no shard lock is held across the await.
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

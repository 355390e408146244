//! Reconcile loop behaviour against in-memory collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedlic_aggregator::{change_channel, ChangeEvent};
use fedlic_core::{
    DeploymentRole, LicenseObject, LicenseRecord, RecordKey, ResourceCount, ResourceCounts,
    ViolationType,
};
use fedlic_crypto::{fixtures, signed};
use fedlic_policy::LicenseVerifier;
use fedlic_reconciler::{
    CountSource, LicenseReconciler, LicenseStore, LoopConfig, MemoryLicenseStore, ReconcileError,
    ReconcileLoop, StaticCounts, StatusCache, StoreError,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Rejects the first `conflicts` writes with a version conflict.
struct Flaky {
    inner: MemoryLicenseStore,
    conflicts: AtomicUsize,
    puts: AtomicUsize,
}

impl Flaky {
    fn new(conflicts: usize) -> Self {
        Self {
            inner: MemoryLicenseStore::new(),
            conflicts: AtomicUsize::new(conflicts),
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LicenseStore for Flaky {
    async fn get(&self, key: &RecordKey) -> Result<Option<LicenseObject>, StoreError> {
        self.inner.get(key).await
    }

    async fn list_keys(&self) -> Result<Vec<RecordKey>, StoreError> {
        self.inner.list_keys().await
    }

    async fn put(&self, object: LicenseObject) -> Result<LicenseObject, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict {
                key: object.key(),
                expected: object.resource_version,
                actual: object.resource_version + 1,
            });
        }
        self.inner.put(object).await
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }
}

/// Counts a test can change while the loop runs.
struct SharedCounts(Mutex<ResourceCounts>);

impl SharedCounts {
    fn set(&self, counts: ResourceCounts) {
        *self.0.lock() = counts;
    }
}

#[async_trait]
impl CountSource for SharedCounts {
    async fn counts(&self) -> Result<ResourceCounts, ReconcileError> {
        Ok(*self.0.lock())
    }
}

fn record(max_node: u64) -> LicenseRecord {
    let now = Utc::now();
    windowed(
        max_node,
        now - chrono::Duration::days(1),
        now + chrono::Duration::days(30),
    )
}

fn windowed(max_node: u64, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> LicenseRecord {
    let rec = LicenseRecord {
        id: "lic-loop".into(),
        license_type: "subscription".into(),
        subject: "acme".into(),
        issuer: "fedlic".into(),
        not_before: Some(not_before),
        not_after: Some(not_after),
        max_cluster: 1,
        max_node,
        ..Default::default()
    };
    signed(&rec, &fixtures::signing_key()).unwrap()
}

fn counts(nodes: u64) -> ResourceCounts {
    ResourceCounts {
        host: ResourceCount {
            node_num: nodes,
            core_num: nodes * 2,
        },
        member: ResourceCount::default(),
        cluster_num: 1,
    }
}

async fn seed(store: &dyn LicenseStore, key: &RecordKey, rec: &LicenseRecord) {
    let mut obj = LicenseObject::new(key);
    obj.set_record(rec).unwrap();
    store.put(obj).await.unwrap();
}

fn fast() -> LoopConfig {
    LoopConfig {
        backoff_base: Duration::from_millis(10),
        backoff_max: Duration::from_millis(50),
        resync: None,
    }
}

fn reconciler(
    store: Arc<dyn LicenseStore>,
    nodes: u64,
    cache: Arc<StatusCache>,
) -> Arc<LicenseReconciler> {
    reconciler_with(store, Arc::new(StaticCounts(counts(nodes))), cache)
}

fn reconciler_with(
    store: Arc<dyn LicenseStore>,
    counts: Arc<dyn CountSource>,
    cache: Arc<StatusCache>,
) -> Arc<LicenseReconciler> {
    Arc::new(LicenseReconciler::new(
        DeploymentRole::Standalone,
        store,
        LicenseVerifier::new(Arc::new(fixtures::trust_anchor())),
        counts,
        cache,
    ))
}

async fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    wait_within(what, Duration::from_secs(5), cond).await
}

async fn wait_within<F: Fn() -> bool>(what: &str, limit: Duration, cond: F) {
    let deadline = tokio::time::Instant::now() + limit;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn initial_pass_covers_default_and_stored_records() {
    let store = Arc::new(MemoryLicenseStore::new());
    let tenant = RecordKey::new("tenant-a", "license");
    seed(store.as_ref(), &tenant, &record(1)).await;

    let cache = Arc::new(StatusCache::new());
    let lp = ReconcileLoop::new(reconciler(store.clone(), 2, cache.clone()), fast());
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    wait_for("both statuses", || cache.len() == 2).await;
    assert_eq!(cache.violation().unwrap().kind, ViolationType::EmptyLicense);
    assert_eq!(
        cache.get(&tenant).unwrap().violation.kind,
        ViolationType::NodeOverflow
    );
    // The absent default object is never created.
    assert!(store.get(&RecordKey::default()).await.unwrap().is_none());

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn conflicts_are_retried_until_written() {
    let store = Arc::new(Flaky::new(3));
    seed(&store.inner, &RecordKey::default(), &record(5)).await;

    let cache = Arc::new(StatusCache::new());
    let lp = ReconcileLoop::new(reconciler(store.clone(), 2, cache.clone()), fast());
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    wait_for("status after retries", || cache.violation().is_some()).await;
    assert!(cache.violation().unwrap().is_none());
    let persisted = store.get(&RecordKey::default()).await.unwrap().unwrap();
    assert!(persisted.status().unwrap().violation.is_none());
    assert_eq!(store.puts.load(Ordering::SeqCst), 4);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn record_trigger_picks_up_new_record_once() {
    let store = Arc::new(Flaky::new(0));
    let cache = Arc::new(StatusCache::new());
    let lp = ReconcileLoop::new(reconciler(store.clone(), 1, cache.clone()), fast());
    let handle = lp.handle();
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    wait_for("initial empty status", || cache.violation().is_some()).await;
    assert_eq!(cache.violation().unwrap().kind, ViolationType::EmptyLicense);

    seed(store.as_ref(), &RecordKey::default(), &record(5)).await;
    handle.record_changed(RecordKey::default());
    wait_for("compliant status", || {
        cache.violation().is_some_and(|v| v.is_none())
    })
    .await;
    let writes = store.puts.load(Ordering::SeqCst);

    // Re-triggering an unchanged record writes nothing.
    handle.record_changed(RecordKey::default());
    handle.nodes_changed();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.puts.load(Ordering::SeqCst), writes);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn member_loop_does_nothing() {
    let store = Arc::new(MemoryLicenseStore::new());
    seed(store.as_ref(), &RecordKey::default(), &record(1)).await;
    let cache = Arc::new(StatusCache::new());
    let r = Arc::new(LicenseReconciler::new(
        DeploymentRole::Member,
        store.clone(),
        LicenseVerifier::new(Arc::new(fixtures::trust_anchor())),
        Arc::new(StaticCounts(counts(9))),
        cache.clone(),
    ));
    let lp = ReconcileLoop::new(r, fast());
    let handle = lp.handle();
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    handle.nodes_changed();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cache.is_empty());

    cancel.cancel();
    task.await.unwrap();
}

fn violation_is(cache: &StatusCache, kind: ViolationType) -> bool {
    cache.violation().is_some_and(|v| v.kind == kind)
}

#[tokio::test]
async fn record_expires_without_any_trigger() {
    let store = Arc::new(MemoryLicenseStore::new());
    let now = Utc::now();
    let rec = windowed(5, now - chrono::Duration::days(1), now + chrono::Duration::seconds(2));
    seed(store.as_ref(), &RecordKey::default(), &rec).await;

    let cache = Arc::new(StatusCache::new());
    let lp = ReconcileLoop::new(reconciler(store.clone(), 1, cache.clone()), fast());
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    wait_for("compliant status", || violation_is(&cache, ViolationType::None)).await;
    wait_within("expiry", Duration::from_secs(8), || {
        violation_is(&cache, ViolationType::TimeExpired)
    })
    .await;
    let persisted = store.get(&RecordKey::default()).await.unwrap().unwrap();
    assert_eq!(persisted.status().unwrap().violation.kind, ViolationType::TimeExpired);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn pending_record_becomes_valid_at_its_start() {
    let store = Arc::new(MemoryLicenseStore::new());
    let now = Utc::now();
    let rec = windowed(5, now + chrono::Duration::seconds(2), now + chrono::Duration::days(30));
    seed(store.as_ref(), &RecordKey::default(), &rec).await;

    let cache = Arc::new(StatusCache::new());
    let lp = ReconcileLoop::new(reconciler(store.clone(), 1, cache.clone()), fast());
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    wait_for("not-yet-valid status", || {
        violation_is(&cache, ViolationType::TimeNotStart)
    })
    .await;
    wait_within("start of validity", Duration::from_secs(8), || {
        violation_is(&cache, ViolationType::None)
    })
    .await;

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn aggregator_change_reevaluates_counts() {
    let store = Arc::new(MemoryLicenseStore::new());
    seed(store.as_ref(), &RecordKey::default(), &record(5)).await;
    let shared = Arc::new(SharedCounts(Mutex::new(counts(2))));
    let cache = Arc::new(StatusCache::new());
    let (tx, rx) = change_channel();
    let lp = ReconcileLoop::new(
        reconciler_with(store.clone(), shared.clone(), cache.clone()),
        fast(),
    )
    .with_changes(rx);
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    wait_for("compliant status", || violation_is(&cache, ViolationType::None)).await;

    shared.set(counts(9));
    tokio::time::sleep(Duration::from_millis(100)).await;
    // Nothing re-reads counts until the aggregator reports a change.
    assert!(violation_is(&cache, ViolationType::None));

    tx.send(ChangeEvent { generation: 1 }).await.unwrap();
    wait_for("node overflow", || {
        violation_is(&cache, ViolationType::NodeOverflow)
    })
    .await;

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn periodic_resync_picks_up_silent_count_changes() {
    let store = Arc::new(MemoryLicenseStore::new());
    seed(store.as_ref(), &RecordKey::default(), &record(5)).await;
    let shared = Arc::new(SharedCounts(Mutex::new(counts(2))));
    let cache = Arc::new(StatusCache::new());
    let config = LoopConfig {
        resync: Some(Duration::from_millis(100)),
        ..fast()
    };
    let lp = ReconcileLoop::new(reconciler_with(store, shared.clone(), cache.clone()), config);
    let cancel = CancellationToken::new();
    let task = lp.spawn(cancel.clone());

    wait_for("compliant status", || violation_is(&cache, ViolationType::None)).await;
    shared.set(counts(9));
    wait_for("node overflow", || {
        violation_is(&cache, ViolationType::NodeOverflow)
    })
    .await;

    cancel.cancel();
    task.await.unwrap();
}

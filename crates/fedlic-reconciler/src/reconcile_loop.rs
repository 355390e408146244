//! # Reconcile Loop
//!
//! Event-driven driver for [`LicenseReconciler`]. Triggers arrive through a
//! [`ReconcileHandle`] (record changed, nodes changed) and, on a federation
//! host, from the aggregator's change channel.
//!
//! - A record trigger reconciles that record.
//! - A topology trigger reconciles every stored record plus the default
//!   one, since counts are shared by all of them.
//! - Reconciliations run as tasks; the reconciler's per-key lock keeps
//!   one in flight per record.
//! - A retryable failure re-queues its key after an exponential backoff
//!   (`base`, doubling, capped at `max`). Terminal failures are logged
//!   and dropped. A success resets the key's backoff.
//! - A success also arms a recheck timer for the record's next validity
//!   bound, so windows open and close without any external event. A
//!   newer reconcile of the same key replaces its timer.
//! - Every `resync` period all records are reconciled again.
//!
//! All records are reconciled once at start.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fedlic_aggregator::ChangeEvent;
use fedlic_core::RecordKey;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ReconcileError;
use crate::reconciler::{LicenseReconciler, ReconcileOutcome};

/// Buffered triggers before senders start dropping.
const TRIGGER_BUFFER: usize = 256;

/// Longest a recheck timer sleeps; far bounds are approached in steps.
const MAX_RECHECK: Duration = Duration::from_secs(24 * 60 * 60);

type Done = (
    RecordKey,
    Result<ReconcileOutcome, ReconcileError>,
    Option<DateTime<Utc>>,
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// One license object changed.
    Record(RecordKey),
    /// Resource counts may have changed for every record.
    Topology,
    /// Backoff elapsed for a failed record.
    Retry(RecordKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// First retry delay (default: 200 ms).
    pub backoff_base: Duration,
    /// Retry delay cap (default: 30 s).
    pub backoff_max: Duration,
    /// Full reconcile period; `None` disables it (default: 60 s).
    pub resync: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(30),
            resync: Some(Duration::from_secs(60)),
        }
    }
}

impl LoopConfig {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }
}

/// Sends triggers to a running loop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReconcileHandle {
    pub(crate) tx: mpsc::Sender<Trigger>,
}

impl ReconcileHandle {
    pub fn record_changed(&self, key: RecordKey) {
        self.send(Trigger::Record(key));
    }

    pub fn nodes_changed(&self) {
        self.send(Trigger::Topology);
    }

    fn send(&self, trigger: Trigger) {
        if let Err(e) = self.tx.try_send(trigger) {
            // A full buffer already holds enough work to converge.
            warn!(error = %e, "reconcile trigger dropped");
        }
    }
}

pub struct ReconcileLoop {
    reconciler: Arc<LicenseReconciler>,
    config: LoopConfig,
    tx: mpsc::Sender<Trigger>,
    rx: mpsc::Receiver<Trigger>,
    changes: Option<mpsc::Receiver<ChangeEvent>>,
}

impl ReconcileLoop {
    pub fn new(reconciler: Arc<LicenseReconciler>, config: LoopConfig) -> Self {
        let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
        Self {
            reconciler,
            config,
            tx,
            rx,
            changes: None,
        }
    }

    /// Treat aggregator change events as topology triggers.
    pub fn with_changes(mut self, changes: mpsc::Receiver<ChangeEvent>) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn handle(&self) -> ReconcileHandle {
        ReconcileHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        if !self.reconciler.role().enforces() {
            info!(role = %self.reconciler.role(), "license reconciliation disabled for this role");
            cancel.cancelled().await;
            return;
        }

        info!("license reconcile loop started");
        let mut tasks: JoinSet<Done> = JoinSet::new();
        let mut attempts: HashMap<RecordKey, u32> = HashMap::new();
        let mut timers: HashMap<RecordKey, CancellationToken> = HashMap::new();
        let mut resync = self.config.resync.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        self.reconcile_all(&mut tasks).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("license reconcile loop shutting down");
                    break;
                }
                Some(trigger) = self.rx.recv() => match trigger {
                    Trigger::Record(key) | Trigger::Retry(key) => {
                        self.reconcile_one(&mut tasks, key)
                    }
                    Trigger::Topology => self.reconcile_all(&mut tasks).await,
                },
                event = next_change(&mut self.changes) => match event {
                    Some(event) => {
                        debug!(generation = event.generation, "aggregator reported a change");
                        self.reconcile_all(&mut tasks).await;
                    }
                    None => {
                        debug!("aggregator change channel closed");
                        self.changes = None;
                    }
                },
                _ = next_tick(&mut resync) => {
                    debug!("periodic license resync");
                    self.reconcile_all(&mut tasks).await;
                }
                Some(joined) = tasks.join_next() => match joined {
                    Ok((key, result, recheck)) => {
                        if result.is_ok() {
                            self.schedule(&key, recheck, &mut timers, &cancel);
                        }
                        self.settle(key, result, &mut attempts, &cancel);
                    }
                    Err(e) => error!(error = %e, "reconcile task failed"),
                },
            }
        }
    }

    /// Replace the key's recheck timer with one firing at `at`.
    fn schedule(
        &self,
        key: &RecordKey,
        at: Option<DateTime<Utc>>,
        timers: &mut HashMap<RecordKey, CancellationToken>,
        cancel: &CancellationToken,
    ) {
        if let Some(previous) = timers.remove(key) {
            previous.cancel();
        }
        let Some(at) = at else { return };
        let delay = (at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(MAX_RECHECK);
        debug!(%key, %at, "recheck scheduled");
        let timer = cancel.child_token();
        timers.insert(key.clone(), timer.clone());
        let tx = self.tx.clone();
        let key = key.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Trigger::Record(key)).await;
                }
            }
        });
    }

    fn reconcile_one(&self, tasks: &mut JoinSet<Done>, key: RecordKey) {
        let reconciler = Arc::clone(&self.reconciler);
        tasks.spawn(async move {
            let result = reconciler.reconcile(&key).await;
            let recheck = match result {
                Ok(_) => reconciler.next_transition(&key).await.unwrap_or_else(|e| {
                    warn!(%key, error = %e, "cannot compute next recheck");
                    None
                }),
                Err(_) => None,
            };
            (key, result, recheck)
        });
    }

    async fn reconcile_all(&self, tasks: &mut JoinSet<Done>) {
        let mut keys: BTreeSet<RecordKey> = BTreeSet::from([RecordKey::default()]);
        match self.reconciler.store().list_keys().await {
            Ok(stored) => keys.extend(stored),
            Err(e) => warn!(error = %e, "cannot list license objects, reconciling default only"),
        }
        for key in keys {
            self.reconcile_one(tasks, key);
        }
    }

    fn settle(
        &self,
        key: RecordKey,
        result: Result<ReconcileOutcome, ReconcileError>,
        attempts: &mut HashMap<RecordKey, u32>,
        cancel: &CancellationToken,
    ) {
        match result {
            Ok(outcome) => {
                attempts.remove(&key);
                debug!(%key, ?outcome, "reconciled");
            }
            Err(e) if e.is_retryable() => {
                let attempt = attempts.entry(key.clone()).or_insert(0);
                let delay = self.config.backoff(*attempt);
                *attempt = attempt.saturating_add(1);
                warn!(%key, error = %e, retry_in = ?delay, "reconcile failed, retrying");
                let tx = self.tx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let _ = tx.send(Trigger::Retry(key)).await;
                        }
                    }
                });
            }
            Err(e) => {
                attempts.remove(&key);
                error!(%key, error = %e, "reconcile failed permanently");
            }
        }
    }
}

async fn next_tick(resync: &mut Option<Interval>) {
    match resync {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_change(changes: &mut Option<mpsc::Receiver<ChangeEvent>>) -> Option<ChangeEvent> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

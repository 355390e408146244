//! # Cluster Resource Aggregator
//!
//! A background task that periodically lists the nodes of the host cluster
//! and every ready member cluster and publishes the result as an immutable
//! [`ClusterSnapshot`].
//!
//! # Architecture
//!
//! Each cycle:
//! 1. Reads the registry and evicts cached clients of removed clusters.
//! 2. Lists every ready cluster concurrently, each call bounded by
//!    `cluster_timeout`. A cluster that fails or times out is logged and
//!    left out of the snapshot; nothing is carried forward.
//! 3. Publishes current and previous generations in one atomic store.
//! 4. If the two generations differ, bumps the generation counter and
//!    offers one [`ChangeEvent`] to the change sink without blocking.
//!
//! Readers ([`get_cluster_info`](ClusterResourceAggregator::get_cluster_info),
//! [`counts`](ClusterResourceAggregator::counts)) only load the published
//! snapshot and never make remote calls.
//!
//! The change channel has capacity one. When an event is already pending a
//! new one is dropped: consumers only need to know that something changed
//! since they last looked, and re-read the snapshot themselves.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use fedlic_core::ResourceCounts;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ClientCache;
use crate::config::AggregatorConfig;
use crate::error::AggregatorError;
use crate::lister::{ClusterConnector, NodeLister};
use crate::registry::ClusterRegistry;
use crate::snapshot::{node_set, ClusterInfoView, ClusterSnapshot, Generations, HOST_CLUSTER};

/// Capacity of the change channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 1;

/// "The aggregated topology changed." Carries the generation it was
/// emitted for; consumers read the snapshot for details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub generation: u64,
}

/// A bounded, coalescing change channel.
pub fn change_channel() -> (mpsc::Sender<ChangeEvent>, mpsc::Receiver<ChangeEvent>) {
    mpsc::channel(CHANGE_CHANNEL_CAPACITY)
}

pub struct ClusterResourceAggregator {
    registry: Arc<dyn ClusterRegistry>,
    connector: Arc<dyn ClusterConnector>,
    host: Option<Arc<dyn NodeLister>>,
    config: AggregatorConfig,
    generations: ArcSwap<Generations>,
    cache: ClientCache,
    change_tx: Option<mpsc::Sender<ChangeEvent>>,
    generation: AtomicU64,
    primed: AtomicBool,
    // Serializes cycles between the loop and `collect_now`.
    cycle_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ClusterResourceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterResourceAggregator")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .field("has_host", &self.host.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

impl ClusterResourceAggregator {
    pub fn new(
        registry: Arc<dyn ClusterRegistry>,
        connector: Arc<dyn ClusterConnector>,
        config: AggregatorConfig,
    ) -> Result<Self, AggregatorError> {
        config.validate()?;
        Ok(Self {
            registry,
            connector,
            host: None,
            config,
            generations: ArcSwap::from_pointee(Generations::default()),
            cache: ClientCache::new(),
            change_tx: None,
            generation: AtomicU64::new(0),
            primed: AtomicBool::new(false),
            cycle_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// List the host cluster's nodes with `lister` under the empty key.
    pub fn with_host(mut self, lister: Arc<dyn NodeLister>) -> Self {
        self.host = Some(lister);
        self
    }

    /// Offer change events to `tx`. See [`change_channel`].
    pub fn with_change_sink(mut self, tx: mpsc::Sender<ChangeEvent>) -> Self {
        self.change_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Number of changes observed so far. Increases by one per changed cycle.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether at least one cycle has completed.
    pub fn is_primed(&self) -> bool {
        self.primed.load(Ordering::Acquire)
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<ClusterSnapshot> {
        Arc::clone(&self.generations.load().current)
    }

    /// Flattened (cluster, node) facts of the current snapshot.
    pub fn get_cluster_info(&self) -> ClusterInfoView {
        self.generations.load().current.view()
    }

    /// Host/member counts of the current snapshot.
    pub fn counts(&self) -> ResourceCounts {
        self.generations.load().current.counts()
    }

    /// Spawn the periodic loop. It stops when `cancel` fires; a cycle that is
    /// already running completes first.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(cancel).await })
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_secs = self.config.period.as_secs(),
            cluster_timeout_secs = self.config.cluster_timeout.as_secs(),
            "cluster aggregation started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cluster aggregation shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.collect_now().await;
                }
            }
        }
    }

    /// Run one cycle now. Returns whether the topology changed.
    #[tracing::instrument(name = "aggregation_cycle", skip_all)]
    pub async fn collect_now(&self) -> bool {
        let _cycle = self.cycle_lock.lock().await;

        let next = self.collect().await;
        let clusters = next.cluster_num();
        let nodes = next.node_num();
        let generations = self.generations.load().advance(next);
        let changed = generations.changed();
        self.generations.store(Arc::new(generations));
        self.primed.store(true, Ordering::Release);

        metrics::counter!("fedlic_aggregator_cycles_total").increment(1);
        metrics::gauge!("fedlic_aggregator_clusters").set(clusters as f64);
        metrics::gauge!("fedlic_aggregator_nodes").set(nodes as f64);

        if changed {
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            info!(generation, clusters, nodes, "cluster topology changed");
            self.emit(generation);
        } else {
            debug!(clusters, nodes, "cluster topology unchanged");
        }
        changed
    }

    async fn collect(&self) -> ClusterSnapshot {
        let clusters = match self.registry.list_clusters().await {
            Ok(clusters) => clusters,
            Err(e) => {
                warn!(error = %e, "cannot read cluster registry, counting host only");
                metrics::counter!("fedlic_aggregator_registry_failures_total").increment(1);
                Vec::new()
            }
        };
        let names: HashSet<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
        self.cache.retain(&names);

        let timeout = self.config.cluster_timeout;
        let mut tasks = JoinSet::new();
        let mut spawn_listing = |name: String, lister: Arc<dyn NodeLister>| {
            tasks.spawn(async move {
                let result = tokio::time::timeout(timeout, lister.list_nodes()).await;
                (name, result)
            });
        };

        if let Some(host) = &self.host {
            spawn_listing(HOST_CLUSTER.to_string(), Arc::clone(host));
        }
        for cluster in &clusters {
            if cluster.name == HOST_CLUSTER {
                warn!("ignoring registry entry with an empty cluster name");
                continue;
            }
            if !cluster.ready {
                debug!(cluster = %cluster.name, "cluster not ready, skipping");
                continue;
            }
            match self.cache.get_or_connect(cluster, self.connector.as_ref()) {
                Ok(lister) => spawn_listing(cluster.name.clone(), lister),
                Err(e) => record_failure(&cluster.name, &e),
            }
        }

        let mut snapshot = ClusterSnapshot::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(Ok(nodes)))) => snapshot.insert_cluster(name, node_set(&nodes)),
                Ok((name, Ok(Err(e)))) => record_failure(&name, &e),
                Ok((name, Err(_elapsed))) => {
                    let e = AggregatorError::Timeout {
                        cluster: name.clone(),
                        after: timeout,
                    };
                    record_failure(&name, &e);
                }
                Err(e) => warn!(error = %e, "cluster listing task failed"),
            }
        }
        snapshot
    }

    fn emit(&self, generation: u64) {
        let Some(tx) = &self.change_tx else {
            return;
        };
        match tx.try_send(ChangeEvent { generation }) {
            Ok(()) => debug!(generation, "change event sent"),
            Err(TrySendError::Full(_)) => {
                metrics::counter!("fedlic_aggregator_change_events_dropped_total").increment(1);
                debug!(generation, "change event already pending, coalesced");
            }
            Err(TrySendError::Closed(_)) => debug!(generation, "change receiver gone"),
        }
    }
}

fn record_failure(cluster: &str, error: &AggregatorError) {
    let label = if cluster == HOST_CLUSTER { "host" } else { cluster };
    warn!(cluster = label, error = %error, "omitting cluster from this cycle");
    metrics::counter!("fedlic_aggregator_cluster_failures_total", "cluster" => label.to_string())
        .increment(1);
}

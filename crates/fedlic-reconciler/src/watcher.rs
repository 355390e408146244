//! Node watcher for standalone deployments.
//!
//! Polls the local [`NodeLister`] and sends a topology trigger whenever the
//! set of nodes, their schedulability, or their core capacity changes. The
//! first successful listing only sets the baseline; the reconcile loop
//! already evaluates everything at start.

use std::sync::Arc;
use std::time::Duration;

use fedlic_aggregator::{node_set, NodeLister, NodeSet};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reconcile_loop::ReconcileHandle;

pub struct LocalNodeWatcher {
    lister: Arc<dyn NodeLister>,
    handle: ReconcileHandle,
    period: Duration,
    timeout: Duration,
}

impl LocalNodeWatcher {
    pub fn new(
        lister: Arc<dyn NodeLister>,
        handle: ReconcileHandle,
        period: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            lister,
            handle,
            period,
            timeout,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(period = ?self.period, "local node watcher started");
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last: Option<NodeSet> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("local node watcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(current) = self.poll().await {
                        match &last {
                            Some(previous) if current != *previous => {
                                info!(nodes = current.len(), "local nodes changed");
                                self.handle.nodes_changed();
                            }
                            Some(_) => {}
                            None => debug!(nodes = current.len(), "local node baseline recorded"),
                        }
                        last = Some(current);
                    }
                }
            }
        }
    }

    /// One listing. Failures keep the previous baseline.
    async fn poll(&self) -> Option<NodeSet> {
        match tokio::time::timeout(self.timeout, self.lister.list_nodes()).await {
            Ok(Ok(nodes)) => Some(node_set(&nodes)),
            Ok(Err(e)) => {
                warn!(error = %e, "listing local nodes failed");
                None
            }
            Err(_) => {
                warn!(after = ?self.timeout, "listing local nodes timed out");
                None
            }
        }
    }
}

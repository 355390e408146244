//! # Application State
//!
//! Shared state for the Axum application, passed to handlers through the
//! `State` extractor and to the enforcement filter.
//!
//! Everything here is constructed at startup and injected: the reconciler
//! (which owns the store, verifier and status cache), the handle used to
//! trigger reconciliations, and the optional Prometheus handle.

use std::sync::Arc;

use fedlic_core::{DeploymentRole, RecordKey};
use fedlic_reconciler::{LicenseReconciler, LicenseStore, ReconcileHandle, StatusCache};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::middleware::enforcement::EnforcementConfig;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<LicenseReconciler>,
    /// Absent when no reconcile loop runs; writes then only reach the store.
    pub reconcile: Option<ReconcileHandle>,
    pub enforcement: Arc<EnforcementConfig>,
    pub metrics: Option<PrometheusHandle>,
    /// The license object served by the management API.
    pub key: RecordKey,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("reconciler", &self.reconciler)
            .field("reconcile", &self.reconcile.is_some())
            .field("enforcement", &self.enforcement)
            .field("metrics", &self.metrics.is_some())
            .field("key", &self.key)
            .finish()
    }
}

impl AppState {
    pub fn new(reconciler: Arc<LicenseReconciler>) -> Self {
        Self {
            reconciler,
            reconcile: None,
            enforcement: Arc::new(EnforcementConfig::default()),
            metrics: None,
            key: RecordKey::default(),
        }
    }

    pub fn with_reconcile_handle(mut self, handle: ReconcileHandle) -> Self {
        self.reconcile = Some(handle);
        self
    }

    pub fn with_enforcement(mut self, config: EnforcementConfig) -> Self {
        self.enforcement = Arc::new(config);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn role(&self) -> DeploymentRole {
        self.reconciler.role()
    }

    pub fn store(&self) -> &Arc<dyn LicenseStore> {
        self.reconciler.store()
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        self.reconciler.cache()
    }

    /// Ask the reconcile loop to re-evaluate the served object.
    pub fn record_changed(&self) {
        if let Some(handle) = &self.reconcile {
            handle.record_changed(self.key.clone());
        }
    }
}

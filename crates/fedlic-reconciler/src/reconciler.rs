//! # License Reconciler
//!
//! Recomputes the [`LicenseStatus`] of one license object and persists it
//! next to the record.
//!
//! ## Flow
//!
//! 1. Member role: nothing happens, ever.
//! 2. Load the object. No object, or no record payload, is `EmptyLicense`:
//!    the cache is updated and nothing is written. A deleted object other
//!    than the default one is dropped from the cache instead.
//! 3. Take counts from the [`CountSource`] and evaluate with
//!    [`LicenseVerifier::check`] plus the [`ViolationPolicyEvaluator`].
//! 4. If the new status equals the persisted one, skip the write.
//!    Otherwise write conditionally on the loaded `resource_version`.
//!    A conflict is returned so the caller retries against fresh state; a
//!    vanished object is not an error.
//! 5. Publish the status to the [`StatusCache`].
//!
//! Reconciliations of the same object are serialized by a per-key lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fedlic_core::{
    DeploymentRole, LicenseObject, LicenseRecord, LicenseStatus, RecordKey, ResourceCounts,
    Violation,
};
use fedlic_policy::{LicenseVerifier, ViolationPolicyEvaluator};
use tracing::{debug, info};

use crate::counts::CountSource;
use crate::error::{ReconcileError, StoreError};
use crate::locks::KeyedLocks;
use crate::status_cache::StatusCache;
use crate::store::LicenseStore;

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Member role; nothing evaluated.
    Inert,
    /// No record to evaluate; `EmptyLicense` cached (or the entry dropped
    /// for a deleted non-default object), nothing written.
    Missing,
    /// Status already up to date; nothing written.
    Unchanged(LicenseStatus),
    /// New status persisted.
    Written(LicenseStatus),
    /// The object disappeared before the write landed.
    Gone,
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Inert => "inert",
            Self::Missing => "missing",
            Self::Unchanged(_) => "unchanged",
            Self::Written(_) => "written",
            Self::Gone => "gone",
        }
    }
}

/// An evaluation that has not been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub record: Option<LicenseRecord>,
    pub status: LicenseStatus,
}

pub struct LicenseReconciler {
    role: DeploymentRole,
    store: Arc<dyn LicenseStore>,
    verifier: LicenseVerifier,
    counts: Arc<dyn CountSource>,
    cache: Arc<StatusCache>,
    locks: KeyedLocks,
}

impl std::fmt::Debug for LicenseReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseReconciler")
            .field("role", &self.role)
            .field("cached_statuses", &self.cache.len())
            .finish()
    }
}

impl LicenseReconciler {
    pub fn new(
        role: DeploymentRole,
        store: Arc<dyn LicenseStore>,
        verifier: LicenseVerifier,
        counts: Arc<dyn CountSource>,
        cache: Arc<StatusCache>,
    ) -> Self {
        Self {
            role,
            store,
            verifier,
            counts,
            cache,
            locks: KeyedLocks::new(),
        }
    }

    pub fn role(&self) -> DeploymentRole {
        self.role
    }

    pub fn store(&self) -> &Arc<dyn LicenseStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        &self.cache
    }

    pub fn verifier(&self) -> &LicenseVerifier {
        &self.verifier
    }

    #[tracing::instrument(name = "reconcile", skip(self), fields(key = %key))]
    pub async fn reconcile(&self, key: &RecordKey) -> Result<ReconcileOutcome, ReconcileError> {
        if !self.role.enforces() {
            return Ok(ReconcileOutcome::Inert);
        }
        let _guard = self.locks.lock(key).await;
        let result = self.reconcile_locked(key, Utc::now()).await;
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        metrics::counter!("fedlic_reconcile_total", "outcome" => label).increment(1);
        result
    }

    async fn reconcile_locked(
        &self,
        key: &RecordKey,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(mut object) = self.store.get(key).await? else {
            debug!("no license object");
            if *key == RecordKey::default() {
                self.publish_empty(key);
            } else {
                self.cache.remove(key);
            }
            return Ok(ReconcileOutcome::Missing);
        };
        if object.record_payload().is_none() {
            debug!("license object holds no record");
            self.publish_empty(key);
            return Ok(ReconcileOutcome::Missing);
        }

        let counts = self.counts.counts().await?;
        let status = self.evaluate_object(&object, counts, now).status;

        if object.status().as_ref() == Some(&status) {
            self.cache.publish(key.clone(), status.clone());
            return Ok(ReconcileOutcome::Unchanged(status));
        }

        object
            .set_status(&status)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        match self.store.put(object).await {
            Ok(_) => {
                info!(violation = %status.violation, "license status updated");
                self.cache.publish(key.clone(), status.clone());
                Ok(ReconcileOutcome::Written(status))
            }
            Err(e) if e.is_not_found() => {
                debug!("license object deleted during reconcile");
                Ok(ReconcileOutcome::Gone)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn publish_empty(&self, key: &RecordKey) {
        let status = LicenseStatus::new(ResourceCounts::default(), Violation::empty_license());
        self.cache.publish(key.clone(), status);
    }

    fn evaluate_object(
        &self,
        object: &LicenseObject,
        counts: ResourceCounts,
        now: DateTime<Utc>,
    ) -> Evaluation {
        self.evaluate_with(object.record_payload(), counts, now)
    }

    fn evaluate_with(
        &self,
        payload: Option<&str>,
        counts: ResourceCounts,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let evaluator = ViolationPolicyEvaluator::new(counts);
        let (record, violation) = self.verifier.check_payload(payload, now, &[&evaluator]);
        Evaluation {
            record,
            status: LicenseStatus::new(counts, violation),
        }
    }

    /// Evaluate a payload against live counts without persisting anything.
    /// Used to validate submitted records and to answer reads for objects
    /// that have no persisted status yet.
    ///
    /// A member only checks content (empty, format, signature, type) and
    /// otherwise reports no violation with zero counts; it never evaluates
    /// validity windows or limits.
    pub async fn evaluate_live(&self, payload: Option<&str>) -> Result<Evaluation, ReconcileError> {
        let now = Utc::now();
        if !self.role.enforces() {
            let (record, violation) = self.verifier.check_payload(payload, now, &[]);
            let violation = if violation.kind.rejects_content() {
                violation
            } else {
                Violation::none()
            };
            return Ok(Evaluation {
                record,
                status: LicenseStatus::new(ResourceCounts::default(), violation),
            });
        }
        if payload.map_or(true, |p| p.trim().is_empty()) {
            return Ok(self.evaluate_with(None, ResourceCounts::default(), now));
        }
        let counts = self.counts.live_counts().await?;
        Ok(self.evaluate_with(payload, counts, now))
    }

    /// When the stored record's verdict next depends on the clock: the
    /// nearest future validity bound of the record or its components.
    pub async fn next_transition(
        &self,
        key: &RecordKey,
    ) -> Result<Option<DateTime<Utc>>, ReconcileError> {
        let record = match self.store.get(key).await? {
            Some(object) => object.record().ok().flatten(),
            None => None,
        };
        Ok(record.and_then(|r| LicenseVerifier::next_transition(&r, Utc::now())))
    }
}

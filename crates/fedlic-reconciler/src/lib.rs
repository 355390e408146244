//! # fedlic-reconciler — License Status Reconciliation
//!
//! Keeps the persisted status of every license object in line with the
//! record it holds and the resources it currently covers.
//!
//! - [`LicenseStore`]: conditional-write persistence for license objects,
//!   in memory ([`MemoryLicenseStore`]) or in one JSON file
//!   ([`FileLicenseStore`]).
//! - [`LicenseReconciler`]: evaluates one object and writes its status only
//!   when it changed.
//! - [`ReconcileLoop`]: turns record, node and aggregator changes into
//!   reconciliations, with per-key backoff on retryable failures.
//! - [`StatusCache`]: the latest status per object for the request path.
//! - [`LocalNodeWatcher`]: topology triggers for standalone deployments.
//!
//! ## Crate Policy
//!
//! - A member cluster never evaluates or writes anything.
//! - Verification and policy outcomes are data (a `Violation` in the
//!   status), never errors.
//! - The request path reads [`StatusCache`] only; it never waits on a
//!   reconciliation.

pub mod counts;
pub mod error;
pub mod locks;
pub mod reconcile_loop;
pub mod reconciler;
pub mod status_cache;
pub mod store;
pub mod watcher;

pub use counts::{CountSource, FederatedCounts, LocalCounts, StaticCounts};
pub use error::{ReconcileError, StoreError};
pub use locks::KeyedLocks;
pub use reconcile_loop::{LoopConfig, ReconcileHandle, ReconcileLoop, Trigger};
pub use reconciler::{Evaluation, LicenseReconciler, ReconcileOutcome};
pub use status_cache::StatusCache;
pub use store::{FileLicenseStore, LicenseStore, MemoryLicenseStore};
pub use watcher::LocalNodeWatcher;

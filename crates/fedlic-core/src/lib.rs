//! # fedlic-core — Foundational Types for fedlic
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `serde_json`,
//! `thiserror` and `chrono` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **[`CanonicalBytes`] is the sole signing payload.** Signing and
//!    verification both go through [`LicenseRecord::signing_payload()`].
//!
//! 2. **Outcomes are values.** A license that is expired, over its limits or
//!    badly signed is described by a [`Violation`], never by an error.
//!
//! 3. **Two-key persistence.** [`LicenseObject`] stores the record under
//!    [`LICENSE_DATA_KEY`] and the derived [`LicenseStatus`] under
//!    [`STATUS_ANNOTATION_KEY`].

pub mod canonical;
pub mod error;
pub mod object;
pub mod record;
pub mod role;
pub mod status;
pub mod view;
pub mod violation;

pub use canonical::CanonicalBytes;
pub use error::{CanonicalizationError, FedlicError};
pub use object::{
    LicenseObject, RecordKey, DEFAULT_NAME, DEFAULT_NAMESPACE, LICENSE_DATA_KEY,
    STATUS_ANNOTATION_KEY,
};
pub use record::{ComponentConstraint, LicenseRecord, LicenseType};
pub use role::DeploymentRole;
pub use status::{LicenseStatus, ResourceCount, ResourceCounts};
pub use view::{LicenseView, LICENSE_API_PATH};
pub use violation::{Violation, ViolationType};

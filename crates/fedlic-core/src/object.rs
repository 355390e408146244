//! # Persisted License Object
//!
//! The license lives in a single named object within a fixed namespace. The
//! serialized [`LicenseRecord`] is stored under the `license` data key and,
//! once evaluated, the serialized [`LicenseStatus`] under a side annotation
//! on the same object. Other components read these two keys directly, so
//! their names are part of the interop contract.
//!
//! `resource_version` is owned by the store: it increases on every write and
//! conditional writes are rejected when the caller's version is stale.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FedlicError;
use crate::record::LicenseRecord;
use crate::status::LicenseStatus;

/// Namespace holding the license object.
pub const DEFAULT_NAMESPACE: &str = "fedlic-system";

/// Name of the license object.
pub const DEFAULT_NAME: &str = "fedlic-license";

/// Data key carrying the serialized record.
pub const LICENSE_DATA_KEY: &str = "license";

/// Annotation key carrying the serialized status.
pub const STATUS_ANNOTATION_KEY: &str = "license.fedlic.io/status";

/// Identity of a license object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Default for RecordKey {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_NAME)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The stored object: record under one key, status under another.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseObject {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl LicenseObject {
    /// An empty object for the given key. Version 0 means "not yet stored".
    pub fn new(key: &RecordKey) -> Self {
        Self {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.namespace.clone(), self.name.clone())
    }

    /// The raw record payload, or `None` if absent or blank.
    pub fn record_payload(&self) -> Option<&str> {
        self.data
            .get(LICENSE_DATA_KEY)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Decode the stored record.
    ///
    /// `Ok(None)` means there is no record; `Err` means there is a payload
    /// that does not decode (a format error, not an absence).
    pub fn record(&self) -> Result<Option<LicenseRecord>, FedlicError> {
        self.record_payload()
            .map(LicenseRecord::from_json)
            .transpose()
    }

    pub fn set_record(&mut self, record: &LicenseRecord) -> Result<(), FedlicError> {
        self.data
            .insert(LICENSE_DATA_KEY.to_string(), record.to_json()?);
        Ok(())
    }

    /// Decode the stored status. An undecodable annotation reads as absent,
    /// which makes the reconciler rewrite it.
    pub fn status(&self) -> Option<LicenseStatus> {
        self.annotations
            .get(STATUS_ANNOTATION_KEY)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn set_status(&mut self, status: &LicenseStatus) -> Result<(), FedlicError> {
        self.annotations
            .insert(STATUS_ANNOTATION_KEY.to_string(), serde_json::to_string(status)?);
        Ok(())
    }

    pub fn clear_status(&mut self) {
        self.annotations.remove(STATUS_ANNOTATION_KEY);
    }
}

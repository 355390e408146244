//! # License Record
//!
//! The signed entitlement document. A record names its license type, the
//! subject it was issued to, a validity window, the entitlement limits the
//! policy evaluator enforces, and an ordered list of per-component
//! constraints that carry their own validity windows.
//!
//! ## Wire Shape
//!
//! Fields serialize in camelCase. The license type travels as a plain string
//! so that a record with an unknown type still parses; policy evaluation is
//! what rejects it (as `InvalidType`), not the decoder.
//!
//! ## Signing Payload
//!
//! The signature covers [`LicenseRecord::signing_payload()`]: the record with
//! `signature` cleared, passed through [`CanonicalBytes`]. An empty signature
//! is omitted from the serialized form entirely.
//!
//! The canonical form keeps timestamps to the second, so window bounds are
//! truncated to whole seconds when a record is decoded. A decoded record
//! therefore never carries precision its signature does not cover.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::canonical::CanonicalBytes;
use crate::error::{CanonicalizationError, FedlicError};

/// The kind of entitlement a record grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    /// Capped by cluster count and total node count.
    Subscription,
    /// Capped by cluster count and host-cluster cores.
    Managed,
    /// Capped by total cores across the federation.
    Maintenance,
}

impl LicenseType {
    /// Return the wire representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Managed => "managed",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseType {
    type Err = FedlicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(Self::Subscription),
            "managed" => Ok(Self::Managed),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(FedlicError::Validation(format!(
                "unknown license type {other:?}"
            ))),
        }
    }
}

/// A per-component constraint with its own validity window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConstraint {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(
        default,
        deserialize_with = "whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_after: Option<DateTime<Utc>>,
}

/// The signed entitlement document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// Record identifier. A record is empty iff this is unset.
    #[serde(default)]
    pub id: String,
    /// License type as carried on the wire; see [`LicenseRecord::license_type()`].
    #[serde(rename = "type", default)]
    pub license_type: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub issuer: String,
    /// Start of validity; `None` means valid from the beginning of time.
    #[serde(
        default,
        deserialize_with = "whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<DateTime<Utc>>,
    /// End of validity; `None` means no expiry.
    #[serde(
        default,
        deserialize_with = "whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_after: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub maintenance_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_cluster: u64,
    #[serde(default)]
    pub max_node: u64,
    #[serde(default)]
    pub max_cpu: u64,
    #[serde(default)]
    pub max_core: u64,
    #[serde(default)]
    pub max_vm: u64,
    #[serde(default)]
    pub grace_period_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
    /// Evaluated in order; the first out-of-window component wins.
    #[serde(default)]
    pub components: Vec<ComponentConstraint>,
    /// Base64-encoded RSA PKCS#1 v1.5 signature over the signing payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

impl LicenseRecord {
    /// Parse a record from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, FedlicError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the record (signature included) to JSON.
    pub fn to_json(&self) -> Result<String, FedlicError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether this record is the empty record (no id).
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// The parsed license type, or `None` if the wire value is unknown.
    pub fn license_type(&self) -> Option<LicenseType> {
        self.license_type.parse().ok()
    }

    /// A copy of this record with the signature cleared.
    pub fn unsigned(&self) -> Self {
        Self {
            signature: String::new(),
            ..self.clone()
        }
    }

    /// The canonical bytes the signature is computed over.
    pub fn signing_payload(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(&self.unsigned())
    }
}

fn whole_seconds<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let ts = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(ts.map(|t| t.trunc_subsecs(0)))
}

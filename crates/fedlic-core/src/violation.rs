//! # Violations
//!
//! A [`Violation`] is the single currently-applicable non-compliance reason
//! for a license, or `None`. No history is kept: every evaluation replaces
//! the previous outcome.
//!
//! ## Taxonomy
//!
//! | Type | Terminal? | Resolves by |
//! |------|-----------|-------------|
//! | `EmptyLicense` | until a record is installed | installing a record |
//! | `FormatError`, `InvalidSignature` | yes | replacing the record |
//! | `TimeNotStart`, `TimeExpired` | for "now" | time passing / new record |
//! | `NodeOverflow`, `CoreOverflow`, `ClusterOverflow` | yes | topology or entitlement change |
//! | `InvalidType` | yes | replacing the record |
//!
//! Violations are values, never errors: "no valid license" is an expected,
//! frequent state of the system.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FedlicError;

/// The kind of non-compliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViolationType {
    #[default]
    None,
    EmptyLicense,
    FormatError,
    InvalidSignature,
    TimeExpired,
    TimeNotStart,
    NodeOverflow,
    CoreOverflow,
    ClusterOverflow,
    InvalidType,
}

impl ViolationType {
    /// Return the wire representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::EmptyLicense => "EmptyLicense",
            Self::FormatError => "FormatError",
            Self::InvalidSignature => "InvalidSignature",
            Self::TimeExpired => "TimeExpired",
            Self::TimeNotStart => "TimeNotStart",
            Self::NodeOverflow => "NodeOverflow",
            Self::CoreOverflow => "CoreOverflow",
            Self::ClusterOverflow => "ClusterOverflow",
            Self::InvalidType => "InvalidType",
        }
    }

    /// Whether this outcome rejects the record's content outright, as opposed
    /// to a valid record that is out of window or over its limits.
    pub fn rejects_content(&self) -> bool {
        matches!(
            self,
            Self::EmptyLicense | Self::FormatError | Self::InvalidSignature | Self::InvalidType
        )
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationType {
    type Err = FedlicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "None" => Self::None,
            "EmptyLicense" => Self::EmptyLicense,
            "FormatError" => Self::FormatError,
            "InvalidSignature" => Self::InvalidSignature,
            "TimeExpired" => Self::TimeExpired,
            "TimeNotStart" => Self::TimeNotStart,
            "NodeOverflow" => Self::NodeOverflow,
            "CoreOverflow" => Self::CoreOverflow,
            "ClusterOverflow" => Self::ClusterOverflow,
            "InvalidType" => Self::InvalidType,
            other => {
                return Err(FedlicError::Validation(format!(
                    "unknown violation type {other:?}"
                )))
            }
        };
        Ok(kind)
    }
}

/// The current non-compliance reason, with optional diagnostic context.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(rename = "type", default)]
    pub kind: ViolationType,
    /// Component constraint that produced a time violation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl Violation {
    /// The compliant outcome.
    pub fn none() -> Self {
        Self::default()
    }

    /// A bare violation of the given kind.
    pub fn new(kind: ViolationType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn empty_license() -> Self {
        Self::new(ViolationType::EmptyLicense)
    }

    pub fn format_error(reason: impl Into<String>) -> Self {
        Self::new(ViolationType::FormatError).with_reason(reason)
    }

    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::new(ViolationType::InvalidSignature).with_reason(reason)
    }

    pub fn invalid_type(license_type: &str) -> Self {
        Self::new(ViolationType::InvalidType)
            .with_reason(format!("unknown license type {license_type:?}"))
    }

    /// A time violation carrying the offending window.
    pub fn time(
        kind: ViolationType,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            kind,
            start,
            end,
            ..Self::default()
        }
    }

    /// A limit violation carrying the observed and permitted counts.
    pub fn overflow(kind: ViolationType, current: u64, expected: u64) -> Self {
        Self {
            kind,
            current: Some(current),
            expected: Some(expected),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Whether this is the compliant outcome.
    pub fn is_none(&self) -> bool {
        self.kind == ViolationType::None
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(component) = &self.component {
            write!(f, " [{component}]")?;
        }
        if let (Some(current), Some(expected)) = (self.current, self.expected) {
            write!(f, " (current {current}, expected {expected})")?;
        }
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

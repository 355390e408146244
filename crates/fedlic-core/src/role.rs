//! Deployment role within a federation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FedlicError;

/// How this deployment participates in a federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentRole {
    /// Not federated: only local nodes are counted.
    #[default]
    Standalone,
    /// Owns the federation: counts its own and all member clusters.
    Host,
    /// Subordinate cluster: never computes or enforces licensing.
    Member,
}

impl DeploymentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Host => "host",
            Self::Member => "member",
        }
    }

    /// Whether this deployment computes and enforces licensing.
    pub fn enforces(&self) -> bool {
        !matches!(self, Self::Member)
    }
}

impl fmt::Display for DeploymentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentRole {
    type Err = FedlicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standalone" | "" => Ok(Self::Standalone),
            "host" => Ok(Self::Host),
            "member" => Ok(Self::Member),
            other => Err(FedlicError::Validation(format!(
                "unknown deployment role {other:?} (expected standalone, host or member)"
            ))),
        }
    }
}

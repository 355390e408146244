//! Bootstrap client error types.

use fedlic_core::Violation;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure after all retries.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The server answered with a non-2xx status.
    #[error("license API {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The license is not compliant.
    #[error("license violation: {0}")]
    Violation(Violation),
}

//! Bootstrap client configuration.

use url::Url;

/// Where the management API lives and how to authenticate to it.
///
/// Custom `Debug` redacts the token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the fedlic server.
    pub server_url: Url,
    /// Bearer token, when the server sits behind an authenticating proxy.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            token: None,
            timeout_secs: 10,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FEDLIC_SERVER_URL` (required)
    /// - `FEDLIC_TOKEN` (optional)
    /// - `FEDLIC_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup("FEDLIC_SERVER_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingServerUrl)?;
        let server_url = Url::parse(raw.trim())
            .map_err(|e| ConfigError::InvalidUrl("FEDLIC_SERVER_URL".into(), e.to_string()))?;
        let timeout_secs = match lookup("FEDLIC_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => 10,
        };
        Ok(Self {
            server_url,
            token: lookup("FEDLIC_TOKEN").filter(|t| !t.is_empty()),
            timeout_secs,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FEDLIC_SERVER_URL environment variable is required")]
    MissingServerUrl,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid FEDLIC_TIMEOUT_SECS {0:?}: expected a positive number of seconds")]
    InvalidTimeout(String),
}

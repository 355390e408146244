//! # fedlic-client — Bootstrap Client for the License API
//!
//! Lets a component ask a running fedlic server for the current license
//! decision before it starts serving:
//!
//! ```no_run
//! # async fn start() -> Result<(), fedlic_client::ClientError> {
//! let client = fedlic_client::LicenseClient::new(fedlic_client::ClientConfig::from_env()?)?;
//! client.gate().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Transport failures are retried with backoff; HTTP error statuses are
//! not.

pub mod config;
pub mod error;
pub(crate) mod retry;

pub use config::ClientConfig;
pub use error::ClientError;

use std::time::Duration;

use fedlic_core::{LicenseView, LICENSE_API_PATH};
use url::Url;

#[derive(Debug, Clone)]
pub struct LicenseClient {
    http: reqwest::Client,
    license_url: Url,
    token: Option<String>,
}

impl LicenseClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut base = config.server_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let license_url = base
            .join(LICENSE_API_PATH.trim_start_matches('/'))
            .map_err(|e| {
                config::ConfigError::InvalidUrl("FEDLIC_SERVER_URL".into(), e.to_string())
            })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            license_url,
            token: config.token,
        })
    }

    pub fn license_url(&self) -> &Url {
        &self.license_url
    }

    /// Fetch `{record, status}` from the management API.
    pub async fn get_license(&self) -> Result<LicenseView, ClientError> {
        let endpoint = format!("GET {}", self.license_url.path());
        let resp = retry::retry_send(|| {
            let mut request = self.http.get(self.license_url.clone());
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            request.send()
        })
        .await
        .map_err(|e| ClientError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|e| ClientError::Deserialization { endpoint, source: e })
    }

    /// Succeed only when the license is compliant. A violation is returned
    /// as [`ClientError::Violation`].
    pub async fn gate(&self) -> Result<LicenseView, ClientError> {
        let view = self.get_license().await?;
        if !view.status.violation.is_none() {
            tracing::warn!(violation = %view.status.violation, "license gate closed");
            return Err(ClientError::Violation(view.status.violation));
        }
        tracing::debug!("license gate open");
        Ok(view)
    }
}

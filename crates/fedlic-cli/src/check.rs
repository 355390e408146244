//! # Startup Gate Check
//!
//! Queries a running fedlic server through `fedlic-client` and reports
//! whether the license currently allows components to start. Intended for
//! init containers and deployment scripts: exit `0` means compliant.

use anyhow::{Context, Result};
use clap::Args;
use url::Url;

use fedlic_client::{ClientConfig, ClientError, LicenseClient};

/// Arguments for `fedlic check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Server base URL. Falls back to `FEDLIC_SERVER_URL`.
    #[arg(long)]
    pub server: Option<Url>,
    /// Bearer token. Falls back to `FEDLIC_TOKEN`.
    #[arg(long)]
    pub token: Option<String>,
    /// Request timeout in seconds. Falls back to `FEDLIC_TIMEOUT_SECS`.
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl CheckArgs {
    /// Merge flags over the environment.
    pub fn config(&self) -> Result<ClientConfig> {
        let mut config = match &self.server {
            Some(url) => {
                let mut config = ClientConfig::new(url.clone());
                config.token = std::env::var("FEDLIC_TOKEN").ok().filter(|t| !t.is_empty());
                config
            }
            None => ClientConfig::from_env().context("no --server given")?,
        };
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(secs) = self.timeout {
            anyhow::ensure!(secs > 0, "--timeout must be a positive number of seconds");
            config.timeout_secs = secs;
        }
        Ok(config)
    }
}

pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let config = args.config()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(check(config))
}

/// Run the gate against the configured server.
///
/// A violation is reported on stdout and yields exit code `1`; transport
/// and protocol failures are errors.
pub async fn check(config: ClientConfig) -> Result<u8> {
    let client = LicenseClient::new(config)?;
    tracing::info!(url = %client.license_url(), "checking license");
    match client.gate().await {
        Ok(view) => {
            let id = view.record.as_ref().map(|r| r.id.as_str()).unwrap_or("-");
            println!("OK: license {id} is compliant");
            Ok(0)
        }
        Err(ClientError::Violation(violation)) => {
            println!("VIOLATION: {violation}");
            println!("{}", crate::to_pretty_json(&violation)?);
            Ok(1)
        }
        Err(e) => Err(e).context("license check failed"),
    }
}

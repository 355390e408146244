//! Server configuration.
//!
//! Read from `FEDLIC_*` environment variables. Only the trust certificate
//! is required; a host deployment also needs its cluster registry file.

use std::path::PathBuf;
use std::time::Duration;

use fedlic_aggregator::AggregatorConfig;
use fedlic_core::DeploymentRole;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Custom `Debug` redacts `local_token`.
#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Certificate or public key PEM of the license issuer.
    pub trust_cert: PathBuf,
    pub role: DeploymentRole,
    /// JSON file backing the license store. In memory when unset.
    pub store_path: Option<PathBuf>,
    /// Member cluster registry (host role).
    pub clusters_file: Option<PathBuf>,
    /// API server of the local cluster, for counting its nodes.
    pub local_nodes_url: Option<Url>,
    pub local_token: Option<String>,
    pub aggregation_period: Duration,
    pub cluster_timeout: Duration,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("trust_cert", &self.trust_cert)
            .field("role", &self.role)
            .field("store_path", &self.store_path)
            .field("clusters_file", &self.clusters_file)
            .field("local_nodes_url", &self.local_nodes_url)
            .field("local_token", &self.local_token.as_ref().map(|_| "[REDACTED]"))
            .field("aggregation_period", &self.aggregation_period)
            .field("cluster_timeout", &self.cluster_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Variables:
    /// - `FEDLIC_PORT` (default: 8080)
    /// - `FEDLIC_TRUST_CERT` (required)
    /// - `FEDLIC_ROLE`: `standalone`, `host` or `member` (default: standalone)
    /// - `FEDLIC_STORE_PATH`
    /// - `FEDLIC_CLUSTERS_FILE` (required for `host`)
    /// - `FEDLIC_LOCAL_NODES_URL`, `FEDLIC_LOCAL_TOKEN`
    /// - `FEDLIC_AGGREGATION_PERIOD_SECS` (default: 60)
    /// - `FEDLIC_CLUSTER_TIMEOUT_SECS` (default: 10)
    /// - `FEDLIC_LOG_FORMAT`: `text` or `json` (default: text)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = AggregatorConfig::default();

        let trust_cert = get("FEDLIC_TRUST_CERT")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("FEDLIC_TRUST_CERT"))?;
        let role = match get("FEDLIC_ROLE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("FEDLIC_ROLE", raw))?,
            None => DeploymentRole::Standalone,
        };
        let clusters_file = get("FEDLIC_CLUSTERS_FILE").map(PathBuf::from);
        if role == DeploymentRole::Host && clusters_file.is_none() {
            return Err(ConfigError::Missing("FEDLIC_CLUSTERS_FILE"));
        }
        let local_nodes_url = get("FEDLIC_LOCAL_NODES_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|_| ConfigError::Invalid("FEDLIC_LOCAL_NODES_URL", raw))
            })
            .transpose()?;
        let log_format = match get("FEDLIC_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid("FEDLIC_LOG_FORMAT", other.to_string()))
            }
        };

        Ok(Self {
            port: parse_or(&get, "FEDLIC_PORT", 8080)?,
            trust_cert,
            role,
            store_path: get("FEDLIC_STORE_PATH").map(PathBuf::from),
            clusters_file,
            local_nodes_url,
            local_token: get("FEDLIC_LOCAL_TOKEN"),
            aggregation_period: secs_or(&get, "FEDLIC_AGGREGATION_PERIOD_SECS", defaults.period)?,
            cluster_timeout: secs_or(
                &get,
                "FEDLIC_CLUSTER_TIMEOUT_SECS",
                defaults.cluster_timeout,
            )?,
            log_format,
        })
    }

    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            period: self.aggregation_period,
            cluster_timeout: self.cluster_timeout,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(var, raw)),
        None => Ok(default),
    }
}

fn secs_or(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(get, var, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid(var, "0".into()));
    }
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("FEDLIC_TRUST_CERT", "/etc/fedlic/ca.pem")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.role, DeploymentRole::Standalone);
        assert_eq!(cfg.aggregation_period, Duration::from_secs(60));
        assert_eq!(cfg.cluster_timeout, Duration::from_secs(10));
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert!(cfg.store_path.is_none());
    }

    #[test]
    fn trust_cert_is_required() {
        assert!(matches!(
            load(&[("FEDLIC_PORT", "9000")]),
            Err(ConfigError::Missing("FEDLIC_TRUST_CERT"))
        ));
    }

    #[test]
    fn host_needs_cluster_registry() {
        let err = load(&[("FEDLIC_TRUST_CERT", "ca.pem"), ("FEDLIC_ROLE", "host")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("FEDLIC_CLUSTERS_FILE")));

        let cfg = load(&[
            ("FEDLIC_TRUST_CERT", "ca.pem"),
            ("FEDLIC_ROLE", "host"),
            ("FEDLIC_CLUSTERS_FILE", "clusters.yaml"),
        ])
        .unwrap();
        assert_eq!(cfg.role, DeploymentRole::Host);
    }

    #[test]
    fn rejects_bad_values() {
        for (var, value) in [
            ("FEDLIC_PORT", "eighty"),
            ("FEDLIC_ROLE", "leader"),
            ("FEDLIC_LOG_FORMAT", "xml"),
            ("FEDLIC_CLUSTER_TIMEOUT_SECS", "0"),
            ("FEDLIC_LOCAL_NODES_URL", "not a url"),
        ] {
            let err = load(&[("FEDLIC_TRUST_CERT", "ca.pem"), (var, value)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(v, _) if v == var), "{var}");
        }
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = load(&[
            ("FEDLIC_TRUST_CERT", "ca.pem"),
            ("FEDLIC_LOCAL_TOKEN", "super-secret"),
            ("FEDLIC_LOG_FORMAT", "json"),
        ])
        .unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}

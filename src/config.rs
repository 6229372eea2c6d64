use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Downstream receiver configuration
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Enrichment configuration
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Cluster API configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default location and environment
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ENRICHER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/enricher.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration from a file and environment
    pub fn load_from(config_path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: ENRICHER_)
            .add_source(
                config::Environment::with_prefix("ENRICHER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("enrichment.label_patterns")
                    .with_list_parse_key("enrichment.annotation_patterns"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on for incoming alert batches
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Prometheus evaluation interval; accepted for compatibility, unused
    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_secs: default_request_timeout(),
            evaluation_interval: default_evaluation_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Where enriched batches are forwarded
    #[serde(default = "default_destination_url")]
    pub destination_url: String,

    /// Downstream request timeout (seconds)
    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            destination_url: default_destination_url(),
            timeout_secs: default_proxy_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Patterns selecting object labels by key.
    ///
    /// If the pattern has capturing groups the last one names the resulting
    /// alert label, otherwise the whole match does.
    #[serde(default)]
    pub label_patterns: Vec<String>,

    /// Patterns selecting object annotations by key
    #[serde(default)]
    pub annotation_patterns: Vec<String>,

    /// Maximum owner chain depth followed from the alert's resource
    #[serde(default = "default_max_owner_depth")]
    pub max_owner_depth: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            label_patterns: Vec::new(),
            annotation_patterns: Vec::new(),
            max_owner_depth: default_max_owner_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Kubernetes API server URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token file; skipped when it does not exist
    #[serde(default = "default_token_path")]
    pub token_path: Option<PathBuf>,

    /// CA bundle for the API server certificate
    #[serde(default = "default_ca_cert_path")]
    pub ca_cert_path: Option<PathBuf>,

    /// Accept any API server certificate
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// API request timeout (seconds)
    #[serde(default = "default_cluster_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_path: default_token_path(),
            ca_cert_path: default_ca_cert_path(),
            insecure_skip_tls_verify: false,
            timeout_secs: default_cluster_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:80".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_evaluation_interval() -> String {
    "30s".to_string()
}

fn default_destination_url() -> String {
    "http://localhost:8000/api/v1/alerts".to_string()
}

fn default_proxy_timeout() -> u64 {
    30
}

fn default_max_owner_depth() -> usize {
    16
}

fn default_api_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_token_path() -> Option<PathBuf> {
    Some(PathBuf::from(
        "/var/run/secrets/kubernetes.io/serviceaccount/token",
    ))
}

fn default_ca_cert_path() -> Option<PathBuf> {
    Some(PathBuf::from(
        "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt",
    ))
}

fn default_cluster_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_listen(), "0.0.0.0:80");
        assert_eq!(
            default_destination_url(),
            "http://localhost:8000/api/v1/alerts"
        );
        assert_eq!(default_max_owner_depth(), 16);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_load_embedded_defaults() {
        let config = Config::load_from("does/not/exist").unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:80");
        assert_eq!(config.cluster.api_url, "https://kubernetes.default.svc");
        assert!(config.enrichment.label_patterns.is_empty());
        assert_eq!(config.enrichment.max_owner_depth, 16);
        assert!(config.observability.prometheus_enabled);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enricher.toml");
        std::fs::write(
            &path,
            r#"
[proxy]
destination_url = "http://alertmanager:9093/api/v1/alerts"

[enrichment]
label_patterns = ["monitoring.example.io/(tier)", "team"]
annotation_patterns = ["runbook/(.*)"]
max_owner_depth = 4
"#,
        )
        .unwrap();

        let config = Config::load_from(path.to_str().unwrap()).unwrap();

        assert_eq!(
            config.proxy.destination_url,
            "http://alertmanager:9093/api/v1/alerts"
        );
        assert_eq!(
            config.enrichment.label_patterns,
            vec!["monitoring.example.io/(tier)".to_string(), "team".to_string()]
        );
        assert_eq!(config.enrichment.annotation_patterns, vec!["runbook/(.*)".to_string()]);
        assert_eq!(config.enrichment.max_owner_depth, 4);
        // untouched sections keep their defaults
        assert_eq!(config.server.listen, "0.0.0.0:80");
    }

    #[test]
    fn test_bad_value_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enricher.toml");
        std::fs::write(&path, "[enrichment]\nmax_owner_depth = \"deep\"\n").unwrap();

        let err = Config::load_from(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Configuration(_)));
    }
}

use crate::cluster::{BuiltinKind, KindRegistry, ObjectMeta, ResourceFetcher};
use crate::config::ClusterConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tracing::{debug, info};

/// Read-only client for the Kubernetes REST API
#[derive(Clone)]
pub struct KubeApiClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEnvelope {
    #[serde(default)]
    metadata: ObjectMeta,
}

impl KubeApiClient {
    /// Create a client from cluster configuration.
    ///
    /// The token and CA files are optional so that the same configuration
    /// works both in a pod and against `kubectl proxy`.
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ca_path) = config.ca_cert_path.as_ref().filter(|p| p.exists()) {
            let pem = std::fs::read(ca_path)?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                AppError::Configuration(format!(
                    "Bad cluster CA certificate {}: {}",
                    ca_path.display(),
                    e
                ))
            })?;
            builder = builder.add_root_certificate(cert);
            info!(ca = %ca_path.display(), "Using cluster CA certificate");
        }

        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let token = match config.token_path.as_ref().filter(|p| p.exists()) {
            Some(path) => {
                info!(token = %path.display(), "Using in-cluster service account token");
                Some(std::fs::read_to_string(path)?.trim().to_string())
            }
            None => {
                info!("No service account token found, using unauthenticated requests");
                None
            }
        };

        Ok(Self::with_client(client, config.api_url.clone(), token))
    }

    /// Create a client around an existing HTTP client
    pub fn with_client(client: Client, api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Registry with a fetcher for every built-in kind
    pub fn registry(self: &Arc<Self>) -> KindRegistry {
        let mut registry = KindRegistry::new();
        for kind in BuiltinKind::iter() {
            registry.register(
                kind.to_string(),
                Arc::new(KubeKindFetcher {
                    api: Arc::clone(self),
                    kind,
                }),
            );
        }
        registry
    }

    /// Fetch object metadata from an API path; `Ok(None)` on 404
    pub async fn get_object_meta(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(format!("GET {} timed out", url))
            } else {
                AppError::Cluster(format!("GET {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "Object not found");
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Cluster(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        let envelope: ObjectEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Cluster(format!("Bad object from {}: {}", url, e)))?;

        Ok(Some(envelope.metadata))
    }
}

/// Check that a value can be used as a single API path segment.
///
/// Empty names would address the collection and `.`, `..`, `/` or `%`
/// would address a different resource.
pub fn validate_path_segment(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::Cluster("empty object name".to_string()));
    }
    if value == "." || value == ".." {
        return Err(AppError::Cluster(format!(
            "invalid object name {:?}: may not be '.' or '..'",
            value
        )));
    }
    if let Some(c) = value.chars().find(|c| *c == '/' || *c == '%') {
        return Err(AppError::Cluster(format!(
            "invalid object name {:?}: may not contain '{}'",
            value, c
        )));
    }
    Ok(())
}

/// API path of an object of a built-in kind
pub fn api_path(kind: BuiltinKind, namespace: &str, name: &str) -> Result<String> {
    validate_path_segment(name)?;

    let (prefix, plural) = match kind {
        BuiltinKind::Pod => ("/api/v1", "pods"),
        BuiltinKind::PersistentVolumeClaim => ("/api/v1", "persistentvolumeclaims"),
        BuiltinKind::Namespace => return Ok(format!("/api/v1/namespaces/{}", name)),
        BuiltinKind::Deployment => ("/apis/apps/v1", "deployments"),
        BuiltinKind::ReplicaSet => ("/apis/apps/v1", "replicasets"),
        BuiltinKind::StatefulSet => ("/apis/apps/v1", "statefulsets"),
        BuiltinKind::DaemonSet => ("/apis/apps/v1", "daemonsets"),
        BuiltinKind::Job => ("/apis/batch/v1", "jobs"),
        BuiltinKind::CronJob => ("/apis/batch/v1", "cronjobs"),
    };
    validate_path_segment(namespace)?;

    Ok(format!("{}/namespaces/{}/{}/{}", prefix, namespace, plural, name))
}

struct KubeKindFetcher {
    api: Arc<KubeApiClient>,
    kind: BuiltinKind,
}

#[async_trait]
impl ResourceFetcher for KubeKindFetcher {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<ObjectMeta>> {
        let path = api_path(self.kind, namespace, name)?;
        self.api.get_object_meta(&path).await
    }
}

/// Access to cluster object metadata
///
/// Metadata is fetched through a [`KindRegistry`] that maps a kind name to a
/// [`ResourceFetcher`]. Two backends are provided:
/// - [`KubeApiClient`]: the Kubernetes REST API
/// - [`InMemoryCluster`]: a fixed set of objects, for tests and dry runs

pub mod kube_api;
pub mod memory;

pub use kube_api::KubeApiClient;
pub use memory::InMemoryCluster;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Metadata of a fetched cluster object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub annotations: HashMap<String, String>,

    /// Owners in the order the API returned them
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_owner(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owner_references.push(OwnerReference {
            api_version: String::new(),
            kind: kind.into(),
            name: name.into(),
        });
        self
    }
}

/// Reference from an object to one of its owners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// Fetches the metadata of objects of a single kind
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist.
    ///
    /// `namespace` is empty for cluster-scoped kinds.
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<ObjectMeta>>;
}

/// Kinds the bundled backends know how to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter, EnumString)]
pub enum BuiltinKind {
    Pod,
    Deployment,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    Job,
    CronJob,
    PersistentVolumeClaim,
    Namespace,
}

/// Maps kind names to fetchers. Lookups are case-sensitive.
#[derive(Clone, Default)]
pub struct KindRegistry {
    fetchers: HashMap<String, Arc<dyn ResourceFetcher>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher, replacing any previous one for the kind
    pub fn register(&mut self, kind: impl Into<String>, fetcher: Arc<dyn ResourceFetcher>) {
        let kind = kind.into();
        tracing::debug!(kind = %kind, "Registered resource fetcher");
        self.fetchers.insert(kind, fetcher);
    }

    pub fn with(mut self, kind: impl Into<String>, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.register(kind, fetcher);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ResourceFetcher>> {
        self.fetchers.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.fetchers.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.fetchers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

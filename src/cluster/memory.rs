use crate::cluster::{BuiltinKind, KindRegistry, ObjectMeta, ResourceFetcher};
use crate::error::{AppError, Result};
use crate::models::ResourceIdentity;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use strum::IntoEnumIterator;

/// In-memory cluster (for testing and dry runs)
#[derive(Default)]
pub struct InMemoryCluster {
    objects: DashMap<String, ObjectMeta>,
    unreachable: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an object
    pub fn insert(&self, identity: &ResourceIdentity, meta: ObjectMeta) {
        self.objects.insert(identity.cache_key(), meta);
    }

    /// Remove an object so later fetches report it as missing
    pub fn remove(&self, identity: &ResourceIdentity) {
        self.objects.remove(&identity.cache_key());
    }

    /// Make every fetch fail with a transport error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of fetches served so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Registry with a fetcher for every built-in kind
    pub fn registry(self: &Arc<Self>) -> KindRegistry {
        let mut registry = KindRegistry::new();
        for kind in BuiltinKind::iter() {
            registry.register(kind.to_string(), self.fetcher(kind.as_ref()));
        }
        registry
    }

    /// Fetcher for an arbitrary kind
    pub fn fetcher(self: &Arc<Self>, kind: &str) -> Arc<dyn ResourceFetcher> {
        Arc::new(InMemoryFetcher {
            cluster: Arc::clone(self),
            kind: kind.to_string(),
        })
    }

    fn get(&self, identity: &ResourceIdentity) -> Result<Option<ObjectMeta>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Cluster(format!(
                "cluster unreachable while fetching {}",
                identity
            )));
        }

        Ok(self
            .objects
            .get(&identity.cache_key())
            .map(|entry| entry.value().clone()))
    }
}

struct InMemoryFetcher {
    cluster: Arc<InMemoryCluster>,
    kind: String,
}

#[async_trait]
impl ResourceFetcher for InMemoryFetcher {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<ObjectMeta>> {
        self.cluster
            .get(&ResourceIdentity::new(namespace, self.kind.as_str(), name))
    }
}

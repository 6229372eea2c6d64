use crate::cluster::{KindRegistry, ObjectMeta};
use crate::enrichment::selector::PatternSet;
use crate::metrics::METADATA_FETCHES_TOTAL;
use crate::models::{MetadataLookup, ResourceIdentity, ResourceMetadata};
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

/// Default limit on how many owner levels are followed
pub const DEFAULT_MAX_OWNER_DEPTH: usize = 16;

/// Loads the metadata an alert about a cluster object is enriched with.
///
/// The metadata of an object is its own selected labels and annotations,
/// then whatever its owners contribute, then whatever its namespace
/// contributes; earlier sources win on conflicting keys.
pub struct MetadataProvider {
    registry: KindRegistry,
    label_patterns: PatternSet,
    annotation_patterns: PatternSet,
    max_owner_depth: usize,
}

/// State shared by all branches of one top-level load
#[derive(Default)]
struct LoadScope {
    /// Objects on the path from the top-level object to the current one
    ancestors: HashSet<String>,

    /// Namespaces already loaded
    namespaces: HashMap<String, ResourceMetadata>,
}

impl MetadataProvider {
    pub fn new(
        registry: KindRegistry,
        label_patterns: PatternSet,
        annotation_patterns: PatternSet,
    ) -> Self {
        Self {
            registry,
            label_patterns,
            annotation_patterns,
            max_owner_depth: DEFAULT_MAX_OWNER_DEPTH,
        }
    }

    /// Set how many owner levels are followed
    pub fn with_max_owner_depth(mut self, max_owner_depth: usize) -> Self {
        self.max_owner_depth = max_owner_depth;
        self
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Load the metadata for an object.
    ///
    /// Returns [`MetadataLookup::Unavailable`] only when the object itself
    /// cannot be fetched. Owners and namespaces that cannot be fetched
    /// contribute nothing. Kinds without a registered fetcher yield empty
    /// metadata.
    pub async fn load(&self, identity: &ResourceIdentity) -> MetadataLookup {
        let mut scope = LoadScope::default();
        self.load_scoped(identity, 0, &mut scope).await
    }

    fn load_scoped<'a>(
        &'a self,
        identity: &'a ResourceIdentity,
        depth: usize,
        scope: &'a mut LoadScope,
    ) -> BoxFuture<'a, MetadataLookup> {
        async move {
            let key = identity.cache_key();

            if scope.ancestors.contains(&key) {
                warn!(resource = %key, "Owner cycle detected, ignoring repeated owner");
                return MetadataLookup::Found(ResourceMetadata::default());
            }

            if depth > self.max_owner_depth {
                warn!(
                    resource = %key,
                    max_depth = self.max_owner_depth,
                    "Owner chain too deep, ignoring remaining owners"
                );
                return MetadataLookup::Found(ResourceMetadata::default());
            }

            let object = match self.fetch(identity).await {
                Some(Some(object)) => object,
                Some(None) => return MetadataLookup::Unavailable,
                None => return MetadataLookup::Found(ResourceMetadata::default()),
            };

            scope.ancestors.insert(key.clone());

            let mut metadata = self.select(&object);

            let owners = self.load_owners(identity, &object, depth, scope).await;
            metadata.merge_under(&owners);

            if identity.is_namespaced() {
                let namespace = self.load_namespace(&identity.namespace, depth, scope).await;
                metadata.merge_under(&namespace);
            }

            scope.ancestors.remove(&key);

            debug!(
                resource = %key,
                labels = ?metadata.labels,
                annotations = ?metadata.annotations,
                "Loaded resource metadata"
            );

            MetadataLookup::Found(metadata)
        }
        .boxed()
    }

    /// Fetch an object. `None` when the kind is not registered, `Some(None)`
    /// when the fetch failed or found nothing.
    async fn fetch(&self, identity: &ResourceIdentity) -> Option<Option<ObjectMeta>> {
        let fetcher = match self.registry.get(&identity.kind) {
            Some(fetcher) => fetcher,
            None => {
                warn!(
                    kind = %identity.kind,
                    namespace = %identity.namespace,
                    name = %identity.name,
                    "Unsupported kind, ignoring resource metadata"
                );
                return None;
            }
        };

        let result = fetcher.fetch(&identity.namespace, &identity.name).await;
        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(_) => "error",
        };
        METADATA_FETCHES_TOTAL
            .with_label_values(&[identity.kind.as_str(), outcome])
            .inc();

        match result {
            Ok(Some(object)) => Some(Some(object)),
            Ok(None) => {
                error!(resource = %identity, "Resource not found in cluster");
                Some(None)
            }
            Err(e) => {
                error!(resource = %identity, error = %e, "Error fetching resource");
                Some(None)
            }
        }
    }

    /// Combine the metadata of all owners; the first listed owner wins
    async fn load_owners(
        &self,
        identity: &ResourceIdentity,
        object: &ObjectMeta,
        depth: usize,
        scope: &mut LoadScope,
    ) -> ResourceMetadata {
        let mut combined = ResourceMetadata::default();

        for owner in &object.owner_references {
            let owner_identity = ResourceIdentity::new(
                identity.namespace.as_str(),
                owner.kind.as_str(),
                owner.name.as_str(),
            );
            let owner_metadata = self
                .load_scoped(&owner_identity, depth + 1, scope)
                .await
                .unwrap_or_empty();
            combined.merge_under(&owner_metadata);
        }

        combined
    }

    async fn load_namespace(
        &self,
        namespace: &str,
        depth: usize,
        scope: &mut LoadScope,
    ) -> ResourceMetadata {
        if let Some(loaded) = scope.namespaces.get(namespace) {
            return loaded.clone();
        }

        let identity = ResourceIdentity::namespace(namespace);
        let metadata = self
            .load_scoped(&identity, depth, scope)
            .await
            .unwrap_or_empty();
        scope
            .namespaces
            .insert(namespace.to_string(), metadata.clone());
        metadata
    }

    fn select(&self, object: &ObjectMeta) -> ResourceMetadata {
        ResourceMetadata::new(
            self.label_patterns.select(&object.labels),
            self.annotation_patterns.select(&object.annotations),
        )
    }
}

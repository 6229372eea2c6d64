use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind used when an alert only names a namespace
pub const NAMESPACE_KIND: &str = "Namespace";

/// Identity of a cluster object an alert refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Namespace of the object, empty for cluster-scoped objects
    pub namespace: String,

    /// Object kind, e.g. `Pod`
    pub kind: String,

    /// Object name
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(
        namespace: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Identity of a namespace object
    pub fn namespace(name: impl Into<String>) -> Self {
        Self::new("", NAMESPACE_KIND, name)
    }

    /// Canonical key used for caching; kind is case-insensitive
    pub fn cache_key(&self) -> String {
        format!(
            "ns/{} {}/{}",
            self.namespace,
            self.kind.to_lowercase(),
            self.name
        )
    }

    /// Check if the object lives inside a namespace
    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Labels and annotations selected from a cluster object, ready to be
/// merged into an alert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
}

impl ResourceMetadata {
    pub fn new(labels: HashMap<String, String>, annotations: HashMap<String, String>) -> Self {
        Self {
            labels,
            annotations,
        }
    }

    /// Fill in keys from `extra` that this metadata does not already have
    pub fn merge_under(&mut self, extra: &ResourceMetadata) {
        merge_missing(&mut self.labels, &extra.labels);
        merge_missing(&mut self.annotations, &extra.annotations);
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.annotations.is_empty()
    }
}

/// Outcome of a metadata lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLookup {
    /// Object was fetched, metadata may still be empty
    Found(ResourceMetadata),

    /// Object could not be fetched
    Unavailable,
}

impl MetadataLookup {
    /// Metadata, treating an unavailable object as contributing nothing
    pub fn unwrap_or_empty(self) -> ResourceMetadata {
        match self {
            MetadataLookup::Found(metadata) => metadata,
            MetadataLookup::Unavailable => ResourceMetadata::default(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, MetadataLookup::Unavailable)
    }
}

/// Merge two maps; on conflicting keys the value from `base` wins
pub fn merge_maps(
    base: &HashMap<String, String>,
    extra: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = base.clone();
    merge_missing(&mut merged, extra);
    merged
}

fn merge_missing(base: &mut HashMap<String, String>, extra: &HashMap<String, String>) {
    for (key, value) in extra {
        base.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

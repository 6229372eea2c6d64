use crate::metrics::CACHE_ENTRIES;
use crate::models::{Alert, ResourceIdentity};
use dashmap::DashMap;
use tracing::debug;

/// Last enriched alert per cluster object.
///
/// Entries never expire. Concurrent writers for the same object race and
/// the last write wins.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    entries: DashMap<String, Alert>,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached alert for an object
    pub fn get(&self, resource: &ResourceIdentity) -> Option<Alert> {
        self.entries
            .get(&resource.cache_key())
            .map(|entry| entry.value().clone())
    }

    /// Store the enriched alert for an object, replacing any previous one
    pub fn insert(&self, resource: &ResourceIdentity, alert: Alert) {
        let key = resource.cache_key();
        debug!(resource = %key, "Cache updated");
        self.entries.insert(key, alert);
        CACHE_ENTRIES.set(self.entries.len() as f64);
    }

    pub fn contains(&self, resource: &ResourceIdentity) -> bool {
        self.entries.contains_key(&resource.cache_key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

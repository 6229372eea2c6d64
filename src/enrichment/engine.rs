use crate::cluster::KindRegistry;
use crate::config::EnrichmentConfig;
use crate::enrichment::cache::EnrichmentCache;
use crate::enrichment::codec::{decode_batch, encode_batch};
use crate::enrichment::provider::MetadataProvider;
use crate::enrichment::resolver::resolve;
use crate::enrichment::selector::PatternSet;
use crate::error::Result;
use crate::metrics::{ALERTS_TOTAL, BATCHES_TOTAL, BATCH_DURATION_SECONDS};
use crate::models::{merge_maps, Alert, MetadataLookup};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// How a single alert was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Alert does not refer to a cluster object
    Untargeted,
    /// Alert was enriched from a live lookup
    Enriched,
    /// Resolved alert served from the cache
    ResolvedFromCache,
    /// Lookup failed, served from the cache
    CacheFallback,
    /// Lookup failed and nothing was cached
    Unenriched,
}

impl EnrichmentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentOutcome::Untargeted => "untargeted",
            EnrichmentOutcome::Enriched => "enriched",
            EnrichmentOutcome::ResolvedFromCache => "resolved_from_cache",
            EnrichmentOutcome::CacheFallback => "cache_fallback",
            EnrichmentOutcome::Unenriched => "unenriched",
        }
    }
}

/// Enriches alert batches with cluster object metadata
pub struct EnrichmentEngine {
    provider: MetadataProvider,
    cache: Arc<EnrichmentCache>,
}

impl EnrichmentEngine {
    pub fn new(provider: MetadataProvider, cache: Arc<EnrichmentCache>) -> Self {
        Self { provider, cache }
    }

    /// Build an engine from configuration, compiling the selection patterns
    pub fn from_config(config: &EnrichmentConfig, registry: KindRegistry) -> Result<Self> {
        let label_patterns = PatternSet::compile(&config.label_patterns)?;
        let annotation_patterns = PatternSet::compile(&config.annotation_patterns)?;

        info!(
            label_patterns = label_patterns.len(),
            annotation_patterns = annotation_patterns.len(),
            kinds = ?registry.kinds(),
            "Enrichment engine configured"
        );

        let provider = MetadataProvider::new(registry, label_patterns, annotation_patterns)
            .with_max_owner_depth(config.max_owner_depth);

        Ok(Self::new(provider, Arc::new(EnrichmentCache::new())))
    }

    pub fn cache(&self) -> &Arc<EnrichmentCache> {
        &self.cache
    }

    /// Enrich an encoded batch and encode the result
    pub async fn process_batch(&self, body: &[u8]) -> Result<Vec<u8>> {
        let start = Instant::now();

        let result = async {
            let alerts = decode_batch(body)?;
            let enriched = self.process_alerts(alerts).await;
            encode_batch(&enriched)
        }
        .await;

        BATCH_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());
        BATCHES_TOTAL
            .with_label_values(&[if result.is_ok() { "ok" } else { "error" }])
            .inc();

        result
    }

    /// Enrich alerts in order
    pub async fn process_alerts(&self, alerts: Vec<Alert>) -> Vec<Alert> {
        let mut enriched = Vec::with_capacity(alerts.len());
        for alert in alerts {
            enriched.push(self.process_alert(alert).await);
        }
        enriched
    }

    /// Enrich a single alert
    pub async fn process_alert(&self, alert: Alert) -> Alert {
        let (alert, outcome) = self.enrich(alert).await;
        ALERTS_TOTAL.with_label_values(&[outcome.as_str()]).inc();
        alert
    }

    /// Enrich a single alert and report how it was handled
    pub async fn enrich(&self, mut alert: Alert) -> (Alert, EnrichmentOutcome) {
        let resource = match resolve(&alert.labels) {
            Some(resource) => resource,
            None => return (alert, EnrichmentOutcome::Untargeted),
        };

        if alert.is_resolved() {
            if let Some(cached) = self.cache.get(&resource) {
                debug!(resource = %resource, "Cache hit for resolved alert");
                return (cached, EnrichmentOutcome::ResolvedFromCache);
            }
        }

        match self.provider.load(&resource).await {
            MetadataLookup::Unavailable => match self.cache.get(&resource) {
                Some(cached) => {
                    debug!(resource = %resource, "Metadata unavailable, cache hit");
                    (cached, EnrichmentOutcome::CacheFallback)
                }
                None => {
                    debug!(resource = %resource, "Metadata unavailable, passing alert through");
                    (alert, EnrichmentOutcome::Unenriched)
                }
            },
            MetadataLookup::Found(metadata) => {
                alert.labels = merge_maps(&alert.labels, &metadata.labels);
                alert.annotations = merge_maps(&alert.annotations, &metadata.annotations);
                self.cache.insert(&resource, alert.clone());
                (alert, EnrichmentOutcome::Enriched)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, ObjectMeta};
    use crate::error::AppError;
    use crate::models::{parse_timestamp, ResourceIdentity};
    use std::collections::HashMap;

    fn engine(cluster: &Arc<InMemoryCluster>) -> EnrichmentEngine {
        let config = EnrichmentConfig {
            label_patterns: vec!["example.io/(.*)".to_string()],
            annotation_patterns: vec!["^summary$".to_string()],
            ..EnrichmentConfig::default()
        };
        EnrichmentEngine::from_config(&config, cluster.registry()).unwrap()
    }

    fn pod_alert() -> Alert {
        Alert::new(HashMap::new(), parse_timestamp("2024-03-01T10:00:00Z").unwrap())
            .with_label("alertname", "PodCrashLooping")
            .with_label("namespace", "shop")
            .with_label("pod", "web-0")
    }

    #[tokio::test]
    async fn test_alert_labels_win_over_metadata() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.insert(
            &ResourceIdentity::new("shop", "Pod", "web-0"),
            ObjectMeta::new()
                .with_label("example.io/alertname", "overridden")
                .with_label("example.io/team", "checkout")
                .with_annotation("summary", "web pod"),
        );

        let engine = engine(&cluster);
        let (alert, outcome) = engine.enrich(pod_alert()).await;

        assert_eq!(outcome, EnrichmentOutcome::Enriched);
        assert_eq!(alert.labels["alertname"], "PodCrashLooping");
        assert_eq!(alert.labels["team"], "checkout");
        assert_eq!(alert.annotations["summary"], "web pod");
        assert_eq!(engine.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_untargeted_alert_untouched() {
        let cluster = Arc::new(InMemoryCluster::new());
        let engine = engine(&cluster);

        let alert = Alert::new(HashMap::new(), parse_timestamp("2024-03-01T10:00:00Z").unwrap())
            .with_label("alertname", "Watchdog");
        let (out, outcome) = engine.enrich(alert.clone()).await;

        assert_eq!(outcome, EnrichmentOutcome::Untargeted);
        assert_eq!(out, alert);
        assert_eq!(cluster.fetch_count(), 0);
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_empty_metadata_still_cached() {
        let cluster = Arc::new(InMemoryCluster::new());
        let engine = engine(&cluster);

        let alert = Alert::new(HashMap::new(), parse_timestamp("2024-03-01T10:00:00Z").unwrap())
            .with_label("namespace", "data")
            .with_label("persistentvolume", "pv-1");
        let (out, outcome) = engine.enrich(alert.clone()).await;

        assert_eq!(outcome, EnrichmentOutcome::Enriched);
        assert_eq!(out, alert);
        assert!(engine
            .cache()
            .contains(&ResourceIdentity::new("data", "PersistentVolume", "pv-1")));
    }

    #[tokio::test]
    async fn test_unavailable_without_cache_passes_through() {
        let cluster = Arc::new(InMemoryCluster::new());
        let engine = engine(&cluster);

        let (out, outcome) = engine.enrich(pod_alert()).await;

        assert_eq!(outcome, EnrichmentOutcome::Unenriched);
        assert_eq!(out, pod_alert());
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_resolved_alert_without_cache_does_live_lookup() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.insert(
            &ResourceIdentity::new("shop", "Pod", "web-0"),
            ObjectMeta::new().with_label("example.io/team", "checkout"),
        );
        let engine = engine(&cluster);

        let mut alert = pod_alert();
        alert.resolve(parse_timestamp("2024-03-01T11:00:00Z").unwrap());
        let (out, outcome) = engine.enrich(alert).await;

        assert_eq!(outcome, EnrichmentOutcome::Enriched);
        assert_eq!(out.labels["team"], "checkout");
        assert_eq!(cluster.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_batch_fails_as_a_whole() {
        let cluster = Arc::new(InMemoryCluster::new());
        let engine = engine(&cluster);

        let body = br#"[
            {"labels": {"namespace": "shop"}, "annotations": {}, "startsAt": "2024-03-01T10:00:00Z", "endsAt": "0001-01-01T00:00:00Z"},
            {"labels": {}, "annotations": {}, "startsAt": "2024-03-01T10:00:00Z", "endsAt": "soon"}
        ]"#;

        let err = engine.process_batch(body).await.unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
        assert_eq!(cluster.fetch_count(), 0);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let cluster = Arc::new(InMemoryCluster::new());
        let config = EnrichmentConfig {
            label_patterns: vec!["[a-".to_string()],
            ..EnrichmentConfig::default()
        };

        let result = EnrichmentEngine::from_config(&config, cluster.registry());
        assert!(matches!(result, Err(AppError::InvalidPattern { .. })));
    }
}

/// Prometheus metrics for the enrichment proxy.
///
/// All metrics live in a process-wide registry under the
/// `kube_alert_enricher` namespace and are exposed on `/metrics`.
///
/// # Example
/// ```no_run
/// use kube_alert_enricher::metrics::ALERTS_TOTAL;
///
/// ALERTS_TOTAL.with_label_values(&["enriched"]).inc();
/// ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "kube_alert_enricher";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Alert batches processed
    ///
    /// Labels: status (ok, error)
    pub static ref BATCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("batches_total", "Total number of alert batches processed")
            .namespace(NAMESPACE),
        &["status"]
    ).expect("Failed to create BATCHES_TOTAL metric");

    /// Time spent enriching a batch
    pub static ref BATCH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "batch_duration_seconds",
            "Time spent enriching an alert batch in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).expect("Failed to create BATCH_DURATION_SECONDS metric");

    /// Alerts processed, by how they were enriched
    ///
    /// Labels: outcome (untargeted, enriched, resolved_from_cache, cache_fallback, unenriched)
    pub static ref ALERTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("alerts_total", "Total number of alerts processed")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create ALERTS_TOTAL metric");

    /// Cluster object fetches
    ///
    /// Labels: kind, result (found, not_found, error)
    pub static ref METADATA_FETCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("metadata_fetches_total", "Total number of cluster object fetches")
            .namespace(NAMESPACE),
        &["kind", "result"]
    ).expect("Failed to create METADATA_FETCHES_TOTAL metric");

    /// Entries in the enrichment cache
    pub static ref CACHE_ENTRIES: Gauge = Gauge::with_opts(
        Opts::new("cache_entries", "Number of resources with a cached enriched alert")
            .namespace(NAMESPACE)
    ).expect("Failed to create CACHE_ENTRIES metric");

    /// Requests forwarded to the downstream receiver
    ///
    /// Labels: status_code (status returned to the caller)
    pub static ref PROXY_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("proxy_requests_total", "Total number of requests forwarded downstream")
            .namespace(NAMESPACE),
        &["status_code"]
    ).expect("Failed to create PROXY_REQUESTS_TOTAL metric");
}

/// Register all metrics with the global registry
///
/// Returns an error when called more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(BATCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BATCH_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ALERTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(METADATA_FETCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CACHE_ENTRIES.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PROXY_REQUESTS_TOTAL.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Render all registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

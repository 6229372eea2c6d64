use anyhow::Context;
use clap::Parser;
use kube_alert_enricher::{
    api::{build_router, AlertForwarder, AppState, ALERTS_PATH},
    cluster::KubeApiClient,
    config::{Config, ObservabilityConfig},
    enrichment::EnrichmentEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kube-alert-enricher")]
#[command(version, about = "Enriches Prometheus alerts with Kubernetes resource metadata", long_about = None)]
struct Cli {
    /// Configuration file (overrides ENRICHER_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<String>,

    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Where enriched alert batches are sent
    #[arg(long)]
    destination_url: Option<String>,

    /// Label selection pattern; may be repeated
    #[arg(long = "labels", value_name = "PATTERN")]
    labels: Vec<String>,

    /// Annotation selection pattern; may be repeated
    #[arg(long = "annotations", value_name = "PATTERN")]
    annotations: Vec<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded configuration
    fn apply(self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(url) = self.destination_url {
            config.proxy.destination_url = url;
        }
        if !self.labels.is_empty() {
            config.enrichment.label_patterns = self.labels;
        }
        if !self.annotations.is_empty() {
            config.enrichment.annotation_patterns = self.annotations;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "kube_alert_enricher={level},tower_http={level}",
            level = observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    // Load configuration
    let mut config = match cli.config.take() {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    cli.apply(&mut config);

    // Initialize tracing
    init_tracing(&config.observability);

    tracing::info!("Starting Kube Alert Enricher v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        evaluation_interval = %config.server.evaluation_interval,
        "Evaluation interval is accepted for compatibility and not used"
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = kube_alert_enricher::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Initialize cluster access
    let kube = Arc::new(
        KubeApiClient::new(&config.cluster).context("Failed to create cluster API client")?,
    );
    tracing::info!(api_url = %config.cluster.api_url, "Cluster API client initialized");

    // Initialize enrichment
    let engine = EnrichmentEngine::from_config(&config.enrichment, kube.registry())
        .context("Invalid enrichment configuration")?;

    let forwarder =
        AlertForwarder::new(&config.proxy).context("Failed to create alert forwarder")?;
    tracing::info!(destination = %config.proxy.destination_url, "Alert forwarder initialized");

    let app_state = AppState::new(Arc::new(engine), forwarder);
    let app = build_router(app_state).layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )));

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;

    tracing::info!("HTTP server listening on http://{}", config.server.listen);
    tracing::info!("   Alerts: http://{}{}", config.server.listen, ALERTS_PATH);
    tracing::info!("   Health check: http://{}/healthz", config.server.listen);
    tracing::info!("   Metrics: http://{}/metrics", config.server.listen);
    tracing::info!("Press Ctrl+C to shutdown");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

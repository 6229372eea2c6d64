use crate::api::AppState;
use crate::error::Result;
use crate::metrics::PROXY_REQUESTS_TOTAL;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cached_resources: state.engine.cache().len(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub cached_resources: usize,
}

/// Enrich an alert batch and pass it on to the alert receiver.
///
/// The receiver's status, headers and body are returned as they are. A
/// batch that cannot be enriched is not forwarded.
pub async fn receive_alerts(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = match proxy_alerts(&state, &method, &headers, &body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    PROXY_REQUESTS_TOTAL
        .with_label_values(&[response.status().as_str()])
        .inc();

    response
}

async fn proxy_alerts(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response> {
    let enriched = state.engine.process_batch(body).await?;

    let forwarded = state.forwarder.forward(method, headers, enriched).await?;
    debug!(
        url = %state.forwarder.destination_url(),
        status = forwarded.status.as_u16(),
        "Alert receiver responded"
    );

    Ok((forwarded.status, forwarded.headers, forwarded.body).into_response())
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}

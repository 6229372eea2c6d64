use crate::api::{handlers, AppState};
use axum::{
    routing::{any, get},
    Router,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

/// Path Prometheus posts alert batches to
pub const ALERTS_PATH: &str = "/api/v1/alerts";

/// Build the proxy router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/healthz", get(handlers::health_check))
        .route("/health", get(handlers::health_check))
        // Metrics
        .route("/metrics", get(handlers::metrics))
        // Alert ingestion
        .route(ALERTS_PATH, any(handlers::receive_alerts))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AlertForwarder;
    use crate::cluster::{InMemoryCluster, ObjectMeta};
    use crate::config::EnrichmentConfig;
    use crate::enrichment::EnrichmentEngine;
    use crate::models::ResourceIdentity;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router(cluster: &Arc<InMemoryCluster>, destination_url: String) -> Router {
        let config = EnrichmentConfig {
            label_patterns: vec!["^team$".to_string()],
            ..EnrichmentConfig::default()
        };
        let engine = EnrichmentEngine::from_config(&config, cluster.registry()).unwrap();
        let forwarder = AlertForwarder::with_client(reqwest::Client::new(), destination_url);
        build_router(AppState::new(Arc::new(engine), forwarder))
    }

    #[tokio::test]
    async fn test_enriched_batch_is_forwarded() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.insert(
            &ResourceIdentity::new("shop", "Pod", "web-0"),
            ObjectMeta::new().with_label("team", "checkout"),
        );

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ALERTS_PATH)
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::Regex(r#""team":"checkout""#.to_string()),
                mockito::Matcher::Regex(r#""foo":"bar""#.to_string()),
            ]))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let app = router(&cluster, format!("{}{}", server.url(), ALERTS_PATH));
        let body = json!([{
            "labels": {"namespace": "shop", "pod": "web-0"},
            "annotations": {},
            "startsAt": "2024-03-01T10:00:00Z",
            "endsAt": "0001-01-01T00:00:00Z",
            "foo": "bar"
        }]);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(ALERTS_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_bad_batch_is_not_forwarded() {
        let cluster = Arc::new(InMemoryCluster::new());
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ALERTS_PATH)
            .expect(0)
            .create_async()
            .await;

        let app = router(&cluster, format!("{}{}", server.url(), ALERTS_PATH));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(ALERTS_PATH)
                    .body(Body::from(r#"[{"labels": {}, "startsAt": "now"}]"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error["error"]["code"], "DECODE_ERROR");
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let cluster = Arc::new(InMemoryCluster::new());
        let app = router(&cluster, "http://127.0.0.1:1".to_string());

        for path in ["/healthz", "/health"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let health: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(health["status"], "healthy");
        }
    }
}

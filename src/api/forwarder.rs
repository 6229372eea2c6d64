use crate::config::ProxyConfig;
use crate::error::{AppError, Result};
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Inbound headers that are not passed on to the receiver
fn skip_request_header(name: &HeaderName) -> bool {
    *name == header::HOST || *name == header::CONTENT_LENGTH
}

/// Receiver headers that are not relayed back to the caller
fn skip_response_header(name: &HeaderName) -> bool {
    *name == header::CONTENT_LENGTH
        || *name == header::TRANSFER_ENCODING
        || *name == header::CONNECTION
}

/// Response received from the alert receiver
#[derive(Debug)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends enriched alert batches on to the alert receiver
#[derive(Clone)]
pub struct AlertForwarder {
    client: Client,
    destination_url: String,
}

impl AlertForwarder {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build proxy client: {}", e)))?;

        Ok(Self::with_client(client, config.destination_url.clone()))
    }

    pub fn with_client(client: Client, destination_url: impl Into<String>) -> Self {
        Self {
            client,
            destination_url: destination_url.into(),
        }
    }

    pub fn destination_url(&self) -> &str {
        &self.destination_url
    }

    /// Forward a batch with the caller's method and headers
    pub async fn forward(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> Result<ForwardedResponse> {
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| AppError::Internal(format!("Unsupported method {}: {}", method, e)))?;

        let mut request = self.client.request(method, &self.destination_url);
        for (name, value) in headers {
            if skip_request_header(name) {
                continue;
            }
            request = request.header(name.as_str(), value.as_bytes());
        }

        debug!(url = %self.destination_url, bytes = body.len(), "Forwarding alert batch");

        let response = request.body(body).send().await.map_err(|e| {
            warn!(url = %self.destination_url, error = %e, "Alert receiver unreachable");
            AppError::from(e)
        })?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| AppError::Network(format!("Invalid status from receiver: {}", e)))?;

        let mut relayed = HeaderMap::new();
        for (name, value) in response.headers() {
            let name = match HeaderName::from_bytes(name.as_str().as_bytes()) {
                Ok(name) => name,
                Err(_) => continue,
            };
            if skip_response_header(&name) {
                continue;
            }
            if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
                relayed.append(name, value);
            }
        }

        let body = response.bytes().await?;

        Ok(ForwardedResponse {
            status,
            headers: relayed,
            body: Bytes::from(body.to_vec()),
        })
    }
}

pub mod forwarder;
pub mod handlers;
pub mod routes;

pub use forwarder::{AlertForwarder, ForwardedResponse};
pub use routes::*;

use crate::enrichment::EnrichmentEngine;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EnrichmentEngine>,
    pub forwarder: AlertForwarder,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<EnrichmentEngine>, forwarder: AlertForwarder) -> Self {
        Self {
            engine,
            forwarder,
            started_at: Instant::now(),
        }
    }
}

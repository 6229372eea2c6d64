//! Alert enrichment proxy for Kubernetes.
//!
//! Sits between Prometheus and the alert receiver. Each alert batch is
//! decoded, every alert about a cluster object gets that object's selected
//! labels and annotations (then its owners', then its namespace's), and the
//! enriched batch is forwarded on.

pub mod api;
pub mod cluster;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod metrics;
pub mod models;

pub use error::{AppError, Result};

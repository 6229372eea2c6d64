/// Alert enrichment module
///
/// This module enriches Prometheus alerts with cluster object metadata:
/// - Resolving which object an alert is about
/// - Selecting and renaming labels and annotations by pattern
/// - Walking owner references and the namespace
/// - Caching the last enriched alert per object

pub mod cache;
pub mod codec;
pub mod engine;
pub mod provider;
pub mod resolver;
pub mod selector;

pub use cache::EnrichmentCache;
pub use codec::{decode_batch, encode_batch};
pub use engine::{EnrichmentEngine, EnrichmentOutcome};
pub use provider::{MetadataProvider, DEFAULT_MAX_OWNER_DEPTH};
pub use resolver::{resolve, NAMESPACE_LABEL, TARGET_KINDS};
pub use selector::{select, PatternSet};

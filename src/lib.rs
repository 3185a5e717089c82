//! tm-match: translation-memory fuzzy matching and retrieval.
//! Main library: module wiring, public re-exports, tracing setup.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod scoring;
pub mod service;

pub use cancellation::{GenerationGuard, LookupGeneration};
pub use config::{MatchConfig, TokenMode};
pub use error::{ConfigError, LookupError, StoreError};
pub use memory::cache::MatchCache;
pub use memory::normalize::{DefaultNormalizer, TextNormalizer};
pub use memory::store::{InMemoryStore, TmStore};
pub use memory::{MatchCandidate, MatchQuery, NormalizedQuery, TmEntry};
pub use scoring::SimilarityScore;
pub use service::{BatchOutcome, TranslationMemory};

/// Install a fmt subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tm_match=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

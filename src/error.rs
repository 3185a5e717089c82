//! Error types for configuration, the backing store and lookups.
//! "No match" is never an error: lookups return `Ok(None)` / `Ok(vec![])`.

use thiserror::Error;

/// Raised eagerly when a [`crate::config::MatchConfig`] is validated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("affix_prefix_cap * affix_scaling must not exceed 1.0 (got {cap} * {scaling})")]
    AffixOverflow { cap: usize, scaling: f64 },

    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure reported by a [`crate::memory::store::TmStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("translation memory unavailable: {0}")]
    Unavailable(String),

    #[error("corpus IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corpus parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a retrieval call. Distinct from an empty result.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("candidate fetch failed: {0}")]
    Store(#[from] StoreError),

    #[error("lookup superseded by generation {generation}")]
    Superseded { generation: u64 },
}

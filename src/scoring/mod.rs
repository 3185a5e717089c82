//! Similarity scoring: character distance, token overlap and the weighted composite.

pub mod composite;
pub mod distance;
pub mod tokens;

use serde::Serialize;

pub use composite::CompositeScorer;
pub use distance::DistanceEngine;
pub use tokens::TokenScorer;

/// Per-(query, candidate) score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityScore {
    pub distance: f64,
    pub affix: f64,
    pub token: f64,
    pub context_boost: f64,
    pub category_boost: f64,
    /// Always within [0, 1].
    pub composite: f64,
}

impl SimilarityScore {
    /// Score reported for a normalized-exact source match.
    pub fn exact() -> Self {
        Self {
            distance: 1.0,
            affix: 1.0,
            token: 1.0,
            context_boost: 0.0,
            category_boost: 0.0,
            composite: 1.0,
        }
    }
}

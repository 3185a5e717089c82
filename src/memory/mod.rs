//! Translation memory records, lookup queries and ranked results.
//! Entries are owned by the backing store; this crate only reads and ranks them.

pub mod cache;
pub mod normalize;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::scoring::SimilarityScore;

/// A stored source/target pair available for reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmEntry {
    pub id: i64,
    pub source_text: String,
    pub target_text: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(default)]
    pub game_context: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub usage_count: u32,
    /// Unix seconds.
    #[serde(default)]
    pub last_used_at: Option<i64>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl TmEntry {
    pub fn new(
        id: i64,
        source_text: impl Into<String>,
        target_text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source_text: source_text.into(),
            target_text: target_text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            game_context: None,
            category: None,
            usage_count: 0,
            last_used_at: None,
            quality_score: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Caller-facing lookup request, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchQuery {
    pub text: String,
    pub target_language: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl MatchQuery {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_language: target_language.into(),
            context: None,
            category: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A query after text normalization. Built per call.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub text: String,
    pub target_language: String,
    pub context: Option<String>,
    pub category: Option<String>,
}

/// A ranked lookup result.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub entry: TmEntry,
    pub score: SimilarityScore,
    pub was_exact_match: bool,
    /// Numbers masked out for scoring differ between query and entry.
    /// Such a candidate is never auto-accepted.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub numbers_differ: bool,
}

/// Trimmed, case-folded context or category label; `None` when absent or blank.
pub fn label_key(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_lowercase)
}

/// Context/category comparison shared by narrowing, boosts and cache keys.
pub fn labels_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (label_key(a), label_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

//! Matching configuration.
//! Every knob has a default; a JSON file may override any subset of them.
//! `validate` runs at service construction so bad values never reach query time.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

/// Granularity used by the token overlap scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    Words,
    #[serde(rename = "ngrams")]
    NGrams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub distance_weight: f64,
    pub affix_weight: f64,
    pub token_weight: f64,
    pub context_boost: f64,
    pub category_boost: f64,
    pub min_match_threshold: f64,
    pub auto_accept_threshold: f64,
    pub max_fuzzy_results: usize,
    pub cache_capacity: usize,
    pub token_mode: TokenMode,
    pub ngram_size: usize,
    pub affix_prefix_cap: usize,
    pub affix_scaling: f64,
    pub case_sensitive: bool,
    /// Compare numbers as placeholders during fuzzy scoring. Exact matching
    /// still sees the real numbers, and a candidate whose numbers differ is
    /// never auto-accepted.
    pub mask_numbers: bool,
    /// Count an adjacent swap as one edit instead of two.
    pub use_transpositions: bool,
    /// Pairwise distance memo size. 0 disables memoization.
    pub distance_memo_capacity: usize,
    /// Ask the store for context-narrowed candidates first.
    pub narrow_by_context: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.40,
            affix_weight: 0.30,
            token_weight: 0.30,
            context_boost: 0.05,
            category_boost: 0.03,
            min_match_threshold: 0.85,
            auto_accept_threshold: 0.85,
            max_fuzzy_results: 5,
            cache_capacity: 10_000,
            token_mode: TokenMode::NGrams,
            ngram_size: 2,
            affix_prefix_cap: 4,
            affix_scaling: 0.1,
            case_sensitive: false,
            mask_numbers: false,
            use_transpositions: false,
            distance_memo_capacity: 0,
            narrow_by_context: true,
        }
    }
}

impl MatchConfig {
    /// Load overrides from a JSON file and validate the result.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: MatchConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), "match config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_fields = [
            ("distance_weight", self.distance_weight),
            ("affix_weight", self.affix_weight),
            ("token_weight", self.token_weight),
            ("context_boost", self.context_boost),
            ("category_boost", self.category_boost),
            ("min_match_threshold", self.min_match_threshold),
            ("auto_accept_threshold", self.auto_accept_threshold),
            ("affix_scaling", self.affix_scaling),
        ];
        for (field, value) in unit_fields {
            // NaN fails the range check too.
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }

        let positive_fields = [
            ("max_fuzzy_results", self.max_fuzzy_results),
            ("cache_capacity", self.cache_capacity),
            ("ngram_size", self.ngram_size),
        ];
        for (field, value) in positive_fields {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }

        if self.affix_prefix_cap as f64 * self.affix_scaling > 1.0 {
            return Err(ConfigError::AffixOverflow {
                cap: self.affix_prefix_cap,
                scaling: self.affix_scaling,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.token_mode, TokenMode::NGrams);
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let config = MatchConfig {
            affix_weight: 1.2,
            ..MatchConfig::default()
        };
        match config.validate() {
            Err(ConfigError::OutOfRange { field, .. }) => assert_eq!(field, "affix_weight"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_nan_threshold() {
        let config = MatchConfig {
            min_match_threshold: f64::NAN,
            ..MatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "min_match_threshold", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = MatchConfig {
            cache_capacity: 0,
            ..MatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "cache_capacity" })
        ));
    }

    #[test]
    fn test_rejects_affix_overflow() {
        let config = MatchConfig {
            affix_prefix_cap: 20,
            ..MatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::AffixOverflow { .. })));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: MatchConfig =
            serde_json::from_str(r#"{"min_match_threshold": 0.7, "token_mode": "words"}"#)
                .unwrap();
        assert_eq!(config.min_match_threshold, 0.7);
        assert_eq!(config.token_mode, TokenMode::Words);
        assert_eq!(config.auto_accept_threshold, 0.85);
    }
}

//! Weighted composite of distance, affix and token similarity plus context boosts.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::MatchConfig;
use crate::memory::normalize::NumberMask;
use crate::memory::{labels_match, NormalizedQuery, TmEntry};

use super::distance::DistanceEngine;
use super::tokens::TokenScorer;
use super::SimilarityScore;

pub struct CompositeScorer {
    distance: DistanceEngine,
    tokens: TokenScorer,
    distance_weight: f64,
    affix_weight: f64,
    token_weight: f64,
    context_boost: f64,
    category_boost: f64,
    affix_prefix_cap: usize,
    affix_scaling: f64,
    case_sensitive: bool,
    mask: Option<NumberMask>,
    evaluations: AtomicU64,
}

impl CompositeScorer {
    /// Assumes `config` has already been validated.
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            distance: DistanceEngine::from_config(config),
            tokens: TokenScorer::from_config(config),
            distance_weight: config.distance_weight,
            affix_weight: config.affix_weight,
            token_weight: config.token_weight,
            context_boost: config.context_boost,
            category_boost: config.category_boost,
            affix_prefix_cap: config.affix_prefix_cap,
            affix_scaling: config.affix_scaling,
            case_sensitive: config.case_sensitive,
            mask: config.mask_numbers.then(NumberMask::new),
            evaluations: AtomicU64::new(0),
        }
    }

    /// Score one candidate. `candidate_text` is the entry's already-normalized source.
    /// With number masking on, numbers are compared as placeholders.
    pub fn score(
        &self,
        query: &NormalizedQuery,
        candidate_text: &str,
        entry: &TmEntry,
    ) -> SimilarityScore {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let (query_text, candidate_text) = match &self.mask {
            Some(mask) => (mask.apply(&query.text), mask.apply(candidate_text)),
            None => (Cow::Borrowed(query.text.as_str()), Cow::Borrowed(candidate_text)),
        };
        let distance = self.distance.similarity(&query_text, &candidate_text);
        let affix = self.affix_similarity(distance, &query_text, &candidate_text);
        let token = self.tokens.similarity(&query_text, &candidate_text);

        let context_boost = boost_if(
            labels_match(query.context.as_deref(), entry.game_context.as_deref()),
            self.context_boost,
        );
        let category_boost = boost_if(
            labels_match(query.category.as_deref(), entry.category.as_deref()),
            self.category_boost,
        );

        SimilarityScore {
            distance,
            affix,
            token,
            context_boost,
            category_boost,
            composite: self.compose(distance, affix, token, context_boost + category_boost),
        }
    }

    /// Weighted sum of sub-scores plus boosts, clamped to [0, 1].
    pub fn compose(&self, distance: f64, affix: f64, token: f64, boosts: f64) -> f64 {
        let weighted =
            self.distance_weight * distance + self.affix_weight * affix + self.token_weight * token;
        (weighted + boosts).clamp(0.0, 1.0)
    }

    /// Distance similarity lifted toward 1 by a shared leading prefix.
    pub fn affix_similarity(&self, distance: f64, a: &str, b: &str) -> f64 {
        let prefix = common_prefix_len(a, b, self.affix_prefix_cap, self.case_sensitive);
        (distance + prefix as f64 * self.affix_scaling * (1.0 - distance)).clamp(0.0, 1.0)
    }

    /// True when masking is on and the two texts carry different numbers.
    pub fn numbers_differ(&self, a: &str, b: &str) -> bool {
        self.mask.as_ref().is_some_and(|mask| !mask.same_numbers(a, b))
    }

    pub fn distance_engine(&self) -> &DistanceEngine {
        &self.distance
    }

    /// Number of candidates scored since construction.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }
}

fn common_prefix_len(a: &str, b: &str, cap: usize, case_sensitive: bool) -> usize {
    let fold = |c: char| -> char {
        if case_sensitive {
            c
        } else {
            c.to_lowercase().next().unwrap_or(c)
        }
    };
    a.chars()
        .zip(b.chars())
        .take(cap)
        .take_while(|&(x, y)| fold(x) == fold(y))
        .count()
}

fn boost_if(applies: bool, boost: f64) -> f64 {
    if applies {
        boost
    } else {
        0.0
    }
}

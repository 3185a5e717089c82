//! Retrieval service: fetches candidates for a language, scores them, applies
//! thresholds and returns ranked matches.
//!
//! Exact normalized-source matches short-circuit scoring. The best hit of each
//! lookup is remembered in the match cache; a cache hit is re-scored once against
//! the live entry before it is trusted.

use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, debug_span, warn, Instrument};

use crate::cancellation::GenerationGuard;
use crate::config::MatchConfig;
use crate::error::{ConfigError, LookupError, StoreError};
use crate::memory::cache::{CacheKey, CacheStats, MatchCache};
use crate::memory::normalize::{DefaultNormalizer, TextNormalizer};
use crate::memory::store::TmStore;
use crate::memory::{MatchCandidate, MatchQuery, NormalizedQuery, TmEntry};
use crate::metrics::{metric_names, LookupIds, MetricsRegistry};
use crate::scoring::{CompositeScorer, SimilarityScore};

/// Summary of a batch run through [`TranslationMemory::find_best_matches`].
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    /// One slot per query, in input order.
    pub results: Vec<Option<MatchCandidate>>,
    pub exact: usize,
    pub auto_accepted: usize,
    pub unmatched: usize,
}

pub struct TranslationMemory {
    config: MatchConfig,
    store: Arc<dyn TmStore>,
    normalizer: Arc<dyn TextNormalizer>,
    scorer: CompositeScorer,
    cache: MatchCache,
    metrics: Arc<MetricsRegistry>,
}

impl TranslationMemory {
    /// Build a service using the default normalizer for `config`.
    pub fn new(config: MatchConfig, store: Arc<dyn TmStore>) -> Result<Self, ConfigError> {
        let normalizer = Arc::new(DefaultNormalizer::from_config(&config));
        Self::with_normalizer(config, store, normalizer)
    }

    pub fn with_normalizer(
        config: MatchConfig,
        store: Arc<dyn TmStore>,
        normalizer: Arc<dyn TextNormalizer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity).ok_or(ConfigError::NonPositive {
            field: "cache_capacity",
        })?;
        Ok(Self {
            scorer: CompositeScorer::new(&config),
            cache: MatchCache::new(capacity),
            metrics: Arc::new(MetricsRegistry::new()),
            config,
            store,
            normalizer,
        })
    }

    /// Report into a shared registry instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn scorer(&self) -> &CompositeScorer {
        &self.scorer
    }

    pub fn normalize_query(&self, query: &MatchQuery) -> NormalizedQuery {
        NormalizedQuery {
            text: self.normalizer.normalize(&query.text),
            target_language: query.target_language.clone(),
            context: query.context.clone(),
            category: query.category.clone(),
        }
    }

    /// Best match for `query`, or `None` if nothing clears the minimum threshold.
    pub async fn find_best_match(
        &self,
        query: &MatchQuery,
    ) -> Result<Option<MatchCandidate>, LookupError> {
        let ids = LookupIds::new(0);
        self.best_match(query)
            .instrument(debug_span!("tm_lookup", lookup_id = %ids.lookup_id))
            .await
    }

    /// Like [`Self::find_best_match`], but a result that arrives after a newer
    /// lookup began is discarded as [`LookupError::Superseded`].
    pub async fn find_best_match_guarded(
        &self,
        query: &MatchQuery,
        guard: &GenerationGuard,
    ) -> Result<Option<MatchCandidate>, LookupError> {
        let ids = LookupIds::new(guard.my_generation());
        let result = self
            .best_match(query)
            .instrument(debug_span!(
                "tm_lookup",
                lookup_id = %ids.lookup_id,
                generation = ids.generation
            ))
            .await?;

        if !guard.should_continue() {
            self.metrics.increment(metric_names::SUPERSEDED, 1);
            debug!(generation = ids.generation, "stale lookup result discarded");
            return Err(LookupError::Superseded {
                generation: guard.latest_generation(),
            });
        }
        Ok(result)
    }

    /// Up to `limit` candidates at or above the minimum threshold, best first.
    pub async fn find_fuzzy_matches(
        &self,
        query: &MatchQuery,
        limit: usize,
    ) -> Result<Vec<MatchCandidate>, LookupError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let Some(query) = self.prepare(query) else {
            return Ok(Vec::new());
        };
        self.metrics.increment(metric_names::LOOKUPS, 1);

        let ranked = self.search(&query, limit).await?;
        if let Some(top) = ranked.first() {
            self.cache.put(cache_key(&query), top.entry.id);
        }
        Ok(ranked)
    }

    /// [`Self::find_fuzzy_matches`] with the configured `max_fuzzy_results`.
    pub async fn find_fuzzy_matches_default(
        &self,
        query: &MatchQuery,
    ) -> Result<Vec<MatchCandidate>, LookupError> {
        self.find_fuzzy_matches(query, self.config.max_fuzzy_results)
            .await
    }

    /// Composite at or above the auto-accept threshold, and no masked number
    /// that differs from the query.
    pub fn should_auto_accept(&self, candidate: &MatchCandidate) -> bool {
        !candidate.numbers_differ && candidate.score.composite >= self.config.auto_accept_threshold
    }

    /// Score breakdown of one entry against a query, ignoring thresholds.
    /// `None` if either side normalizes to empty text.
    pub fn score_entry(&self, query: &MatchQuery, entry: &TmEntry) -> Option<SimilarityScore> {
        let query = self.prepare(query)?;
        let source = self.normalizer.normalize(&entry.source_text);
        if source.is_empty() {
            return None;
        }
        if source == query.text {
            return Some(SimilarityScore::exact());
        }
        Some(self.scorer.score(&query, &source, entry))
    }

    /// Forward a "translation applied" event to the store.
    pub async fn record_usage(&self, entry_id: i64) -> Result<(), LookupError> {
        self.store
            .record_usage(entry_id, now_unix())
            .await
            .map_err(|e| self.store_failure(e))
    }

    /// Run a batch of lookups sequentially through the shared cache.
    /// A store failure aborts the batch; retrying is up to the caller.
    pub async fn find_best_matches(
        &self,
        queries: &[MatchQuery],
    ) -> Result<BatchOutcome, LookupError> {
        let mut outcome = BatchOutcome {
            results: Vec::with_capacity(queries.len()),
            ..BatchOutcome::default()
        };
        for query in queries {
            let result = self.find_best_match(query).await?;
            match &result {
                Some(candidate) => {
                    if candidate.was_exact_match {
                        outcome.exact += 1;
                    }
                    if self.should_auto_accept(candidate) {
                        outcome.auto_accepted += 1;
                    }
                }
                None => outcome.unmatched += 1,
            }
            outcome.results.push(result);
        }
        debug!(
            queries = queries.len(),
            exact = outcome.exact,
            auto_accepted = outcome.auto_accepted,
            unmatched = outcome.unmatched,
            "batch lookup done"
        );
        Ok(outcome)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        self.scorer.distance_engine().clear_memo();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn best_match(&self, query: &MatchQuery) -> Result<Option<MatchCandidate>, LookupError> {
        let Some(query) = self.prepare(query) else {
            return Ok(None);
        };
        self.metrics.increment(metric_names::LOOKUPS, 1);
        let key = cache_key(&query);

        if let Some(entry_id) = self.cache.get(&key) {
            if let Some(candidate) = self.revalidate(&query, entry_id).await? {
                self.metrics.increment(metric_names::CACHE_REVALIDATED, 1);
                return Ok(Some(candidate));
            }
            self.metrics.increment(metric_names::CACHE_STALE, 1);
            self.cache.invalidate(&key);
        }

        let best = self.search(&query, 1).await?.into_iter().next();
        if let Some(top) = &best {
            self.cache.put(key, top.entry.id);
        }
        Ok(best)
    }

    /// Normalize and reject empty queries before any store access.
    fn prepare(&self, query: &MatchQuery) -> Option<NormalizedQuery> {
        let normalized = self.normalize_query(query);
        if normalized.text.is_empty() {
            return None;
        }
        Some(normalized)
    }

    /// Re-score a cached entry once; trust it only if it still clears the threshold.
    async fn revalidate(
        &self,
        query: &NormalizedQuery,
        entry_id: i64,
    ) -> Result<Option<MatchCandidate>, LookupError> {
        let entry = self
            .store
            .entry_by_id(entry_id)
            .await
            .map_err(|e| self.store_failure(e))?;

        let Some(entry) = entry else {
            return Ok(None);
        };
        if entry.target_language != query.target_language {
            return Ok(None);
        }
        let source = self.normalizer.normalize(&entry.source_text);
        if source.is_empty() {
            return Ok(None);
        }
        if source == query.text {
            return Ok(Some(exact_candidate(entry)));
        }

        let candidate = self.fuzzy_candidate(query, &source, entry);
        self.metrics.increment(metric_names::CANDIDATES_SCORED, 1);
        if candidate.score.composite < self.config.min_match_threshold {
            return Ok(None);
        }
        Ok(Some(candidate))
    }

    /// Ranked matches for a prepared query.
    ///
    /// Without a narrowing context the whole language corpus is ranked. With one,
    /// the context's entries are fetched first; they are ranked on their own when
    /// they hold an exact match, or when the language has no exact match elsewhere
    /// and at least one of them clears the threshold. Otherwise the whole language
    /// corpus is ranked, so an exact match is never hidden by narrowing.
    async fn search(
        &self,
        query: &NormalizedQuery,
        limit: usize,
    ) -> Result<Vec<MatchCandidate>, LookupError> {
        let Some(context) = self.narrowing_context(query) else {
            let entries = self.fetch_candidates(query, None).await?;
            return Ok(self.select(query, entries, limit));
        };

        let narrowed = self.fetch_candidates(query, Some(context)).await?;
        if self.exact_match(query, &narrowed).is_some() {
            return Ok(self.select(query, narrowed, limit));
        }

        let entries = self.fetch_candidates(query, None).await?;
        if self.exact_match(query, &entries).is_none() {
            let ranked = self.rank(query, narrowed, limit);
            if !ranked.is_empty() {
                return Ok(ranked);
            }
            debug!(context, "no match within context, widening");
        }
        Ok(self.select(query, entries, limit))
    }

    fn narrowing_context<'q>(&self, query: &'q NormalizedQuery) -> Option<&'q str> {
        query
            .context
            .as_deref()
            .map(str::trim)
            .filter(|c| self.config.narrow_by_context && !c.is_empty())
    }

    /// A single best result short-circuits on an exact match without scoring.
    fn select(
        &self,
        query: &NormalizedQuery,
        entries: Vec<TmEntry>,
        limit: usize,
    ) -> Vec<MatchCandidate> {
        if limit == 1 {
            if let Some(exact) = self.exact_match(query, &entries) {
                self.metrics.increment(metric_names::EXACT_MATCHES, 1);
                return vec![exact];
            }
        }
        self.rank(query, entries, limit)
    }

    async fn fetch_candidates(
        &self,
        query: &NormalizedQuery,
        context: Option<&str>,
    ) -> Result<Vec<TmEntry>, LookupError> {
        let span = self.metrics.span(metric_names::FETCH_CANDIDATES);
        let lang = query.target_language.as_str();
        let entries = self
            .store
            .entries_for_language(lang, context)
            .await
            .map_err(|e| self.store_failure(e))?;
        let elapsed_us = span.finish();
        debug!(lang, context = ?context, candidates = entries.len(), elapsed_us, "candidates fetched");
        Ok(entries)
    }

    /// Normalized-exact source match, found without invoking the scorer.
    fn exact_match(&self, query: &NormalizedQuery, candidates: &[TmEntry]) -> Option<MatchCandidate> {
        candidates
            .iter()
            .filter(|e| e.target_language == query.target_language)
            .filter(|e| self.normalizer.normalize(&e.source_text) == query.text)
            .min_by(|a, b| entry_order(a, b))
            .cloned()
            .map(exact_candidate)
    }

    fn rank(&self, query: &NormalizedQuery, candidates: Vec<TmEntry>, limit: usize) -> Vec<MatchCandidate> {
        let span = self.metrics.span(metric_names::SCORE_CANDIDATES);
        let mut skipped = 0u64;
        let mut scored = 0u64;
        let mut matches = Vec::new();

        for entry in candidates {
            if entry.target_language != query.target_language {
                continue;
            }
            let source = self.normalizer.normalize(&entry.source_text);
            if source.is_empty() {
                skipped += 1;
                debug!(entry_id = entry.id, "skipping candidate with empty source text");
                continue;
            }
            if source == query.text {
                matches.push(exact_candidate(entry));
                continue;
            }

            let candidate = self.fuzzy_candidate(query, &source, entry);
            scored += 1;
            if candidate.score.composite >= self.config.min_match_threshold {
                matches.push(candidate);
            }
        }

        matches.sort_by(rank_order);
        matches.truncate(limit);

        if skipped > 0 {
            self.metrics.increment(metric_names::SKIPPED_CANDIDATES, skipped);
        }
        self.metrics.increment(metric_names::CANDIDATES_SCORED, scored);
        let elapsed_us = span.finish();
        debug!(scored, skipped, kept = matches.len(), elapsed_us, "candidates ranked");
        matches
    }

    fn fuzzy_candidate(&self, query: &NormalizedQuery, source: &str, entry: TmEntry) -> MatchCandidate {
        MatchCandidate {
            score: self.scorer.score(query, source, &entry),
            numbers_differ: self.scorer.numbers_differ(&query.text, source),
            was_exact_match: false,
            entry,
        }
    }

    fn store_failure(&self, error: StoreError) -> LookupError {
        self.metrics.increment(metric_names::STORE_FAILURES, 1);
        warn!(error = %error, "translation memory fetch failed");
        LookupError::Store(error)
    }
}

fn cache_key(query: &NormalizedQuery) -> CacheKey {
    MatchCache::compute_key(
        &query.target_language,
        &query.text,
        query.context.as_deref(),
        query.category.as_deref(),
    )
}

fn exact_candidate(entry: TmEntry) -> MatchCandidate {
    MatchCandidate {
        entry,
        score: SimilarityScore::exact(),
        was_exact_match: true,
        numbers_differ: false,
    }
}

/// Most recently used first (never-used last), then lowest id.
fn entry_order(a: &TmEntry, b: &TmEntry) -> Ordering {
    b.last_used_at
        .cmp(&a.last_used_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Composite descending; exact matches ahead of boosted fuzzy ones at 1.0.
fn rank_order(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.score
        .composite
        .total_cmp(&a.score.composite)
        .then_with(|| b.was_exact_match.cmp(&a.was_exact_match))
        .then_with(|| entry_order(&a.entry, &b.entry))
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, composite: f64, last_used_at: Option<i64>) -> MatchCandidate {
        let mut entry = TmEntry::new(id, "s", "t", "en", "fr");
        entry.last_used_at = last_used_at;
        MatchCandidate {
            entry,
            score: SimilarityScore {
                composite,
                ..SimilarityScore::exact()
            },
            was_exact_match: false,
            numbers_differ: false,
        }
    }

    #[test]
    fn test_rank_order_tie_breaks() {
        let mut ranked = vec![
            candidate(5, 0.90, None),
            candidate(3, 0.95, None),
            candidate(4, 0.90, Some(100)),
            candidate(2, 0.90, None),
            candidate(1, 0.90, Some(50)),
        ];
        ranked.sort_by(rank_order);
        let ids: Vec<i64> = ranked.iter().map(|c| c.entry.id).collect();
        assert_eq!(ids, vec![3, 4, 1, 2, 5]);
    }

    #[test]
    fn test_exact_outranks_clamped_fuzzy() {
        let mut fuzzy = candidate(1, 1.0, Some(999));
        fuzzy.was_exact_match = false;
        let mut exact = candidate(2, 1.0, None);
        exact.was_exact_match = true;
        let mut ranked = vec![fuzzy, exact];
        ranked.sort_by(rank_order);
        assert_eq!(ranked[0].entry.id, 2);
    }
}

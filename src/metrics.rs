//! Observability: per-lookup ids, histogram metrics, timing spans and counters.
//! Histograms track p50/p95/p99 for fetch and scoring time; counters track
//! events such as skipped malformed candidates.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Identifier attached to every lookup's log lines.
#[derive(Debug, Clone)]
pub struct LookupIds {
    pub lookup_id: String,
    pub generation: u64,
}

impl LookupIds {
    pub fn new(generation: u64) -> Self {
        Self {
            lookup_id: uuid::Uuid::new_v4().to_string(),
            generation,
        }
    }
}

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn new(name: &'static str, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name,
            start: Instant::now(),
            registry,
        }
    }

    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Fixed-capacity ring buffer for histogram samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

/// Stores histograms and counters for all named metrics.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    counters: Mutex<HashMap<&'static str, u64>>,
    ring_capacity: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            ring_capacity: 1024,
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us = value_us, "metric_recorded");
    }

    pub fn increment(&self, name: &'static str, by: u64) {
        *self.counters.lock().entry(name).or_insert(0) += by;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan::new(name, Arc::clone(self))
    }

    /// p50/p95/p99 of every timing recorded so far, keyed by metric name.
    pub fn summary(&self) -> BTreeMap<&'static str, MetricSummary> {
        self.histograms
            .lock()
            .iter()
            .map(|(&name, ring)| {
                let summary = MetricSummary {
                    p50_us: ring.percentile(50.0),
                    p95_us: ring.percentile(95.0),
                    p99_us: ring.percentile(99.0),
                    count: ring.count,
                };
                (name, summary)
            })
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    pub const FETCH_CANDIDATES: &str = "t_fetch_candidates";
    pub const SCORE_CANDIDATES: &str = "t_score_candidates";
    pub const LOOKUPS: &str = "tm_lookups";
    pub const EXACT_MATCHES: &str = "tm_exact_matches";
    pub const CACHE_REVALIDATED: &str = "tm_cache_revalidated";
    pub const CACHE_STALE: &str = "tm_cache_stale";
    pub const CANDIDATES_SCORED: &str = "tm_candidates_scored";
    pub const SKIPPED_CANDIDATES: &str = "tm_skipped_candidates";
    pub const STORE_FAILURES: &str = "tm_store_failures";
    pub const SUPERSEDED: &str = "tm_superseded";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record(metric_names::SCORE_CANDIDATES, v as f64);
        }
        let summary = registry.summary();
        let scoring = &summary[metric_names::SCORE_CANDIDATES];
        assert_eq!(scoring.p50_us, 51.0);
        assert_eq!(scoring.p99_us, 99.0);
        assert_eq!(scoring.count, 100);
        assert!(!summary.contains_key(metric_names::FETCH_CANDIDATES));
    }

    #[test]
    fn test_ring_keeps_latest_samples() {
        let mut ring = SampleRing::new(3);
        for v in [100.0, 1.0, 2.0, 3.0] {
            ring.push(v);
        }
        assert_eq!(ring.count, 3);
        assert_eq!(ring.percentile(100.0), 3.0);
    }

    #[test]
    fn test_counters() {
        let registry = MetricsRegistry::new();
        registry.increment(metric_names::SKIPPED_CANDIDATES, 2);
        registry.increment(metric_names::SKIPPED_CANDIDATES, 1);
        assert_eq!(registry.counter(metric_names::SKIPPED_CANDIDATES), 3);
        assert_eq!(registry.counter(metric_names::LOOKUPS), 0);
    }

    #[test]
    fn test_span_records_on_finish() {
        let registry = Arc::new(MetricsRegistry::new());
        let span = registry.span(metric_names::FETCH_CANDIDATES);
        span.finish();
        assert_eq!(registry.summary()[metric_names::FETCH_CANDIDATES].count, 1);
    }
}

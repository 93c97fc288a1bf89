//! Metrics collection and reporting
//!
//! Every `record_*` call bumps an in-process counter and forwards to the
//! `metrics` facade, so an installed exporter sees the same numbers that
//! `snapshot()` reports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector for classification monitoring
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    classifications: AtomicU64,
    unclassified: AtomicU64,
    engine_errors: AtomicU64,
    total_latency_us: AtomicU64,
    batches: AtomicU64,
    batch_items_failed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rule_mutations: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful classification
    pub fn record_classification(&self, latency_us: u64, matched: bool) {
        self.inner.classifications.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        if !matched {
            self.inner.unclassified.fetch_add(1, Ordering::Relaxed);
        }

        let outcome = if matched { "matched" } else { "unmatched" };
        ::metrics::counter!("docclass_classifications_total", "outcome" => outcome).increment(1);
        ::metrics::histogram!("docclass_classification_latency_us").record(latency_us as f64);
    }

    /// Record a classification rejected by the engine
    pub fn record_error(&self, kind: &'static str) {
        self.inner.engine_errors.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("docclass_errors_total", "kind" => kind).increment(1);
    }

    /// Record a finished batch
    pub fn record_batch(&self, items: u64, failed: u64) {
        self.inner.batches.fetch_add(1, Ordering::Relaxed);
        self.inner
            .batch_items_failed
            .fetch_add(failed, Ordering::Relaxed);

        ::metrics::counter!("docclass_batches_total").increment(1);
        ::metrics::counter!("docclass_batch_items_total", "outcome" => "ok")
            .increment(items.saturating_sub(failed));
        ::metrics::counter!("docclass_batch_items_total", "outcome" => "failed").increment(failed);
    }

    /// Record a cache lookup
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit {
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
            "hit"
        } else {
            self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
            "miss"
        };
        ::metrics::counter!("docclass_cache_lookups_total", "result" => result).increment(1);
    }

    /// Record a rule mutation
    pub fn record_rule_mutation(&self, op: &'static str) {
        self.inner.rule_mutations.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("docclass_rule_mutations_total", "op" => op).increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            classifications: inner.classifications.load(Ordering::Relaxed),
            unclassified: inner.unclassified.load(Ordering::Relaxed),
            engine_errors: inner.engine_errors.load(Ordering::Relaxed),
            total_latency_us: inner.total_latency_us.load(Ordering::Relaxed),
            batches: inner.batches.load(Ordering::Relaxed),
            batch_items_failed: inner.batch_items_failed.load(Ordering::Relaxed),
            cache_hits: inner.cache_hits.load(Ordering::Relaxed),
            cache_misses: inner.cache_misses.load(Ordering::Relaxed),
            rule_mutations: inner.rule_mutations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub classifications: u64,
    pub unclassified: u64,
    pub engine_errors: u64,
    pub total_latency_us: u64,
    pub batches: u64,
    pub batch_items_failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rule_mutations: u64,
}

impl MetricsSnapshot {
    /// Average latency per classification
    pub fn avg_latency_us(&self) -> u64 {
        if self.classifications == 0 {
            0
        } else {
            self.total_latency_us / self.classifications
        }
    }

    /// Fraction of cache lookups that hit
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

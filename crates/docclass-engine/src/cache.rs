//! Classification result cache
//!
//! Results are keyed by a content fingerprint and the rule set version they
//! were computed against, so a rule change never serves a stale result: the
//! old entries simply stop being addressed and age out.

use docclass_core::{ClassificationResult, Document, Result};
use docclass_rules::RuleSnapshot;
use docclass_telemetry::MetricsCollector;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

use crate::classifier::DocumentClassifier;
use crate::engine::ClassificationEngine;

/// SHA-256 over a document's content and metadata
pub type Fingerprint = [u8; 32];

/// Cache key: what was classified, and against which rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub ruleset_version: u64,
}

impl CacheKey {
    pub fn new(document: &Document, ruleset_version: u64) -> Self {
        Self {
            fingerprint: fingerprint(document),
            ruleset_version,
        }
    }
}

/// Fingerprint everything a predicate can look at
///
/// The document id is deliberately excluded so identical documents share an
/// entry. Fields are length-prefixed to keep boundaries unambiguous.
pub fn fingerprint(document: &Document) -> Fingerprint {
    let mut hasher = Sha256::new();
    write_field(&mut hasher, document.content.as_bytes());
    hasher.update((document.metadata.len() as u64).to_le_bytes());
    for (key, value) in &document.metadata {
        write_field(&mut hasher, key.as_bytes());
        write_field(&mut hasher, value.as_bytes());
    }
    hasher.finalize().into()
}

fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Bounded LRU cache of classification results
pub struct ClassificationCache {
    cache: Option<Cache<CacheKey, Arc<ClassificationResult>>>,
}

impl ClassificationCache {
    /// Create a cache holding at most `capacity` results; 0 disables caching
    pub fn new(capacity: u64) -> Self {
        let cache = (capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build()
        });
        Self { cache }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ClassificationResult>> {
        self.cache.as_ref()?.get(key)
    }

    pub fn put(&self, key: CacheKey, result: ClassificationResult) {
        if let Some(cache) = &self.cache {
            cache.insert(key, Arc::new(result));
        }
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Approximate number of entries
    pub fn entry_count(&self) -> u64 {
        self.cache.as_ref().map_or(0, |c| c.entry_count())
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Engine front that answers repeated documents from the cache
///
/// Hits are re-stamped with the requesting document's id and the current
/// time, so callers cannot tell a cached result from a fresh one.
pub struct CachedClassifier {
    engine: ClassificationEngine,
    cache: ClassificationCache,
    metrics: MetricsCollector,
}

impl CachedClassifier {
    pub fn new(engine: ClassificationEngine, cache: ClassificationCache) -> Self {
        let metrics = engine.metrics().clone();
        Self {
            engine,
            cache,
            metrics,
        }
    }

    pub fn engine(&self) -> &ClassificationEngine {
        &self.engine
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }
}

impl DocumentClassifier for CachedClassifier {
    fn classify(
        &self,
        document: &Document,
        snapshot: &RuleSnapshot,
    ) -> Result<ClassificationResult> {
        // Invalid documents go straight to the engine for rejection
        if !self.cache.is_enabled() || document.id.trim().is_empty() {
            return self.engine.classify(document, snapshot);
        }

        let start = Instant::now();
        let key = CacheKey::new(document, snapshot.version());
        if let Some(hit) = self.cache.get(&key) {
            self.metrics.record_cache_lookup(true);
            trace!(document_id = %document.id, "Classification cache hit");

            let mut result = ClassificationResult::clone(&hit);
            result.document_id = document.id.clone();
            result.timestamp_ms = self.engine.clock().now_ms();
            // Hits count as classifications so enabling the cache only moves latency
            self.metrics.record_classification(
                start.elapsed().as_micros() as u64,
                !result.is_unclassified(),
            );
            return Ok(result);
        }

        self.metrics.record_cache_lookup(false);
        let result = self.engine.classify(document, snapshot)?;
        self.cache.put(key, result.clone());
        Ok(result)
    }

    fn name(&self) -> &str {
        "cached-rule-engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, version: u64) -> ClassificationResult {
        ClassificationResult::empty(id, version, 0)
    }

    #[test]
    fn test_fingerprint_ignores_id_but_not_metadata() {
        let a = Document::new("a", "invoice");
        let b = Document::new("b", "invoice");
        let c = Document::new("a", "invoice").with_metadata("source", "fax");

        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        let a = Document::new("d", "").with_metadata("ab", "c");
        let b = Document::new("d", "").with_metadata("a", "bc");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_put_and_get() {
        let cache = ClassificationCache::new(16);
        let doc = Document::new("d1", "invoice");
        let key = CacheKey::new(&doc, 3);

        assert!(cache.get(&key).is_none());
        cache.put(key, result("d1", 3));
        assert_eq!(cache.get(&key).unwrap().ruleset_version, 3);

        // Same content under a newer rule set is a different entry
        assert!(cache.get(&CacheKey::new(&doc, 4)).is_none());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = ClassificationCache::new(16);
        let key = CacheKey::new(&Document::new("d1", "x"), 1);
        cache.put(key, result("d1", 1));
        cache.invalidate_all();
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_cached_classifier_rebinds_hits() {
        use docclass_core::FixedClock;
        use docclass_rules::{PredicateSpec, RuleDraft, RuleLimits};

        let clock = Arc::new(FixedClock::new(100));
        let engine = ClassificationEngine::new().with_clock(clock.clone());
        let classifier = CachedClassifier::new(engine, ClassificationCache::new(16));

        let rules = vec![RuleDraft::new("inv", "finance", PredicateSpec::keywords(["invoice"]))
            .with_id("inv")
            .into_rule(0)];
        let snapshot = RuleSnapshot::from_rules(1, rules, &RuleLimits::default()).unwrap();

        let first = classifier
            .classify(&Document::new("a", "invoice"), &snapshot)
            .unwrap();
        clock.set(200);
        let second = classifier
            .classify(&Document::new("b", "invoice"), &snapshot)
            .unwrap();

        assert_eq!(second.document_id, "b");
        assert_eq!(second.timestamp_ms, 200);
        assert_eq!(second.assignments, first.assignments);

        let metrics = classifier.engine().metrics().snapshot();
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.classifications, 2);
    }

    #[test]
    fn test_cached_classifier_still_rejects_blank_ids() {
        let classifier =
            CachedClassifier::new(ClassificationEngine::new(), ClassificationCache::new(16));
        let err = classifier
            .classify(&Document::new("", "x"), &RuleSnapshot::empty(1))
            .unwrap_err();
        assert_eq!(err.kind(), "engine");
    }

    fn settle(cache: &ClassificationCache) {
        if let Some(inner) = &cache.cache {
            inner.run_pending_tasks();
        }
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache = ClassificationCache::new(8);
        for i in 0..50 {
            let id = format!("d{}", i);
            let key = CacheKey::new(&Document::new(&id, format!("content {}", i)), 1);
            cache.put(key, result(&id, 1));
        }
        settle(&cache);
        assert!(cache.entry_count() <= 8);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ClassificationCache::new(2);
        let a = CacheKey::new(&Document::new("a", "alpha"), 1);
        let b = CacheKey::new(&Document::new("b", "beta"), 1);
        let c = CacheKey::new(&Document::new("c", "gamma"), 1);

        cache.put(a, result("a", 1));
        cache.put(b, result("b", 1));
        settle(&cache);

        // Touch a so b becomes the oldest
        assert!(cache.get(&a).is_some());
        settle(&cache);

        cache.put(c, result("c", 1));
        settle(&cache);

        assert!(cache.get(&b).is_none());
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&c).is_some());
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = ClassificationCache::new(0);
        assert!(!cache.is_enabled());

        let key = CacheKey::new(&Document::new("d1", "x"), 1);
        cache.put(key, result("d1", 1));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.entry_count(), 0);
    }
}

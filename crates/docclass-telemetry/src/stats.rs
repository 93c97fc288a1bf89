//! Aggregate classification statistics
//!
//! Tracks how many documents were classified, how many matched no rule, the
//! distribution of primary categories, and the mean primary confidence.

use docclass_core::ClassificationResult;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationStats {
    pub total_documents: u64,
    pub classified_documents: u64,
    pub unclassified_documents: u64,
    /// Share of documents with at least one assignment (0.0-1.0)
    pub coverage_rate: f64,
    /// Documents per primary category
    pub category_distribution: BTreeMap<String, u64>,
    /// Mean primary confidence over classified documents
    pub avg_confidence: f64,
}

#[derive(Default)]
struct StatsInner {
    total: u64,
    classified: u64,
    confidence_sum: f64,
    distribution: BTreeMap<String, u64>,
}

/// Accumulates statistics from classification results
#[derive(Default)]
pub struct StatsCollector {
    inner: Mutex<StatsInner>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one result into the statistics
    pub fn record(&self, result: &ClassificationResult) {
        let mut inner = self.inner.lock();
        inner.total += 1;

        if let Some(primary) = result.primary() {
            inner.classified += 1;
            inner.confidence_sum += primary.confidence;
            *inner
                .distribution
                .entry(primary.category.clone())
                .or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> ClassificationStats {
        let inner = self.inner.lock();

        let coverage_rate = if inner.total > 0 {
            inner.classified as f64 / inner.total as f64
        } else {
            0.0
        };
        let avg_confidence = if inner.classified > 0 {
            inner.confidence_sum / inner.classified as f64
        } else {
            0.0
        };

        ClassificationStats {
            total_documents: inner.total,
            classified_documents: inner.classified,
            unclassified_documents: inner.total - inner.classified,
            coverage_rate,
            category_distribution: inner.distribution.clone(),
            avg_confidence,
        }
    }

    /// Forget everything recorded so far
    pub fn reset(&self) {
        *self.inner.lock() = StatsInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docclass_core::CategoryAssignment;
    use std::collections::BTreeSet;

    fn result_with(category: Option<(&str, f64)>) -> ClassificationResult {
        let mut result = ClassificationResult::empty("d", 1, 0);
        if let Some((category, confidence)) = category {
            result.assignments.push(CategoryAssignment {
                category: category.to_string(),
                confidence,
                matched_rule_ids: BTreeSet::new(),
            });
        }
        result
    }

    #[test]
    fn test_stats_accumulate() {
        let stats = StatsCollector::new();
        stats.record(&result_with(Some(("finance", 0.8))));
        stats.record(&result_with(Some(("finance", 0.4))));
        stats.record(&result_with(Some(("legal", 0.6))));
        stats.record(&result_with(None));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_documents, 4);
        assert_eq!(snapshot.classified_documents, 3);
        assert_eq!(snapshot.unclassified_documents, 1);
        assert!((snapshot.coverage_rate - 0.75).abs() < 1e-9);
        assert!((snapshot.avg_confidence - 0.6).abs() < 1e-9);
        assert_eq!(snapshot.category_distribution.get("finance"), Some(&2));
        assert_eq!(snapshot.category_distribution.get("legal"), Some(&1));
    }

    #[test]
    fn test_empty_stats() {
        let stats = StatsCollector::new();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_documents, 0);
        assert_eq!(snapshot.coverage_rate, 0.0);
        assert_eq!(snapshot.avg_confidence, 0.0);

        stats.record(&result_with(None));
        stats.reset();
        assert_eq!(stats.snapshot().total_documents, 0);
    }
}

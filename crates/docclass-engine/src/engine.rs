//! Classification engine
//!
//! A single pass over the enabled rules of one snapshot. Each matching rule
//! contributes `score * weight` to its category; a category's confidence is
//! its summed contribution divided by the total weight of the snapshot's
//! rules for that category, so it stays within `[0.0, 1.0]`.

use docclass_core::{
    CategoryAssignment, ClassificationResult, Clock, Document, Error, Result, SystemClock,
};
use docclass_rules::RuleSnapshot;
use docclass_telemetry::MetricsCollector;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::classifier::DocumentClassifier;
use crate::evaluator::evaluate;

/// Scores documents against rule snapshots
#[derive(Clone)]
pub struct ClassificationEngine {
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
}

#[derive(Default)]
struct CategoryTally {
    contribution: f64,
    max_contribution: f64,
    best_priority: Option<i32>,
    matched_rule_ids: BTreeSet<String>,
}

impl ClassificationEngine {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            metrics: MetricsCollector::new(),
        }
    }

    /// Stamp results with `clock` instead of wall time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Report into a shared metrics collector
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Classify one document against `snapshot`
    ///
    /// Fails only when the document itself is unusable (blank id). A document
    /// that matches nothing yields an empty assignment list.
    pub fn classify(
        &self,
        document: &Document,
        snapshot: &RuleSnapshot,
    ) -> Result<ClassificationResult> {
        let start = Instant::now();

        if document.id.trim().is_empty() {
            self.metrics.record_error("engine");
            return Err(Error::engine("document id must not be blank"));
        }

        let mut tallies: BTreeMap<&str, CategoryTally> = BTreeMap::new();
        for compiled in snapshot.rules() {
            let rule = &compiled.rule;
            let tally = tallies.entry(rule.category.as_str()).or_default();
            tally.max_contribution += rule.weight;

            let score = evaluate(document, &compiled.predicate);
            if score <= 0.0 {
                continue;
            }

            trace!(rule_id = %rule.id, score, "Rule matched");
            tally.contribution += score * rule.weight;
            tally.matched_rule_ids.insert(rule.id.clone());
            tally.best_priority = Some(match tally.best_priority {
                Some(p) => p.min(rule.priority),
                None => rule.priority,
            });
        }

        let mut ranked: Vec<(i32, CategoryAssignment)> = tallies
            .into_iter()
            .filter(|(_, t)| t.contribution > 0.0 && t.max_contribution > 0.0)
            .map(|(category, t)| {
                let confidence = (t.contribution / t.max_contribution).clamp(0.0, 1.0);
                (
                    t.best_priority.unwrap_or(i32::MAX),
                    CategoryAssignment {
                        category: category.to_string(),
                        confidence,
                        matched_rule_ids: t.matched_rule_ids,
                    },
                )
            })
            .collect();
        ranked.sort_by(|(pa, a), (pb, b)| compare_assignments(a, *pa, b, *pb));

        let result = ClassificationResult {
            document_id: document.id.clone(),
            assignments: ranked.into_iter().map(|(_, a)| a).collect(),
            ruleset_version: snapshot.version(),
            timestamp_ms: self.clock.now_ms(),
        };

        let latency_us = start.elapsed().as_micros() as u64;
        self.metrics
            .record_classification(latency_us, !result.assignments.is_empty());

        debug!(
            document_id = %result.document_id,
            ruleset_version = result.ruleset_version,
            categories = result.assignments.len(),
            primary = result.primary_category().unwrap_or("-"),
            latency_us,
            "Classified document"
        );

        Ok(result)
    }
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentClassifier for ClassificationEngine {
    fn classify(
        &self,
        document: &Document,
        snapshot: &RuleSnapshot,
    ) -> Result<ClassificationResult> {
        ClassificationEngine::classify(self, document, snapshot)
    }

    fn name(&self) -> &str {
        "rule-engine"
    }
}

/// Confidence descending, then best rule priority, then category name
fn compare_assignments(
    a: &CategoryAssignment,
    a_priority: i32,
    b: &CategoryAssignment,
    b_priority: i32,
) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a_priority.cmp(&b_priority))
        .then_with(|| a.category.cmp(&b.category))
}

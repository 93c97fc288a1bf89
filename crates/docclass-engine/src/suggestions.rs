//! Category suggestions
//!
//! Where classification folds rules into per-category confidences,
//! suggestions stay at rule granularity: each enabled rule that scores above
//! zero proposes its category along with the evidence it found.

use docclass_core::Document;
use docclass_rules::RuleSnapshot;
use serde::{Deserialize, Serialize};

use crate::evaluator::{evaluate, explain};

/// A proposed category for a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: String,
    pub rule_id: String,
    /// Raw match score of the rule (0.0-1.0)
    pub confidence: f64,
    /// Priority of the proposing rule
    pub priority: i32,
    pub reasons: Vec<String>,
}

/// Rank rule-level suggestions for `document`, best first
pub fn suggest(document: &Document, snapshot: &RuleSnapshot, limit: usize) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = snapshot
        .rules()
        .iter()
        .filter_map(|compiled| {
            let score = evaluate(document, &compiled.predicate);
            (score > 0.0).then(|| Suggestion {
                category: compiled.rule.category.clone(),
                rule_id: compiled.rule.id.clone(),
                confidence: score,
                priority: compiled.rule.priority,
                reasons: explain(document, &compiled.predicate),
            })
        })
        .collect();

    suggestions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    suggestions.truncate(limit);
    suggestions
}

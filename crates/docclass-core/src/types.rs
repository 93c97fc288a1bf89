//! Core types for docclass

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A document submitted for classification
///
/// Documents are immutable inputs; the engine never mutates or retains them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-assigned identifier
    pub id: String,

    /// Text body
    #[serde(default)]
    pub content: String,

    /// Free-form string metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Create a document with content and no metadata
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the document carries no text content
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// One category assigned to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    /// Category label
    pub category: String,

    /// Normalized confidence (0.0-1.0)
    pub confidence: f64,

    /// Rules that contributed to this category
    pub matched_rule_ids: BTreeSet<String>,
}

/// Result of classifying a single document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Document this result belongs to
    pub document_id: String,

    /// Assignments, best first
    pub assignments: Vec<CategoryAssignment>,

    /// Version of the rule set the document was classified against
    pub ruleset_version: u64,

    /// Wall-clock time of classification (unix millis)
    pub timestamp_ms: i64,
}

impl ClassificationResult {
    /// Create an empty result
    pub fn empty(document_id: impl Into<String>, ruleset_version: u64, timestamp_ms: i64) -> Self {
        Self {
            document_id: document_id.into(),
            assignments: Vec::new(),
            ruleset_version,
            timestamp_ms,
        }
    }

    /// Highest ranked assignment, if any rule matched
    pub fn primary(&self) -> Option<&CategoryAssignment> {
        self.assignments.first()
    }

    /// Highest ranked category label
    pub fn primary_category(&self) -> Option<&str> {
        self.primary().map(|a| a.category.as_str())
    }

    /// Whether no rule matched
    pub fn is_unclassified(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Look up the assignment for a category
    pub fn assignment(&self, category: &str) -> Option<&CategoryAssignment> {
        self.assignments.iter().find(|a| a.category == category)
    }
}

/// Per-item failure inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationError {
    /// Document that failed
    pub document_id: String,

    /// Human-readable failure reason
    pub reason: String,
}

impl ClassificationError {
    /// Create a new per-item error
    pub fn new(document_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of one batch item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItemOutcome {
    /// Document classified successfully
    Classified(ClassificationResult),

    /// Document failed; siblings are unaffected
    Failed(ClassificationError),
}

impl BatchItemOutcome {
    /// Whether the item succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Classified(_))
    }

    /// The result, if the item succeeded
    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Classified(result) => Some(result),
            Self::Failed(_) => None,
        }
    }

    /// The error, if the item failed
    pub fn error(&self) -> Option<&ClassificationError> {
        match self {
            Self::Classified(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// A batch result entry, positioned as in the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub document_id: String,
    pub outcome: BatchItemOutcome,
}

/// Batch lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Items still being classified
    Running,
    /// Every item succeeded
    Completed,
    /// At least one item failed and at least one succeeded
    PartiallyFailed,
    /// Every item failed
    Failed,
}

/// A batch of documents classified together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    /// Unique batch identifier
    pub batch_id: String,

    /// Document ids in input order
    pub document_ids: Vec<String>,

    /// Per-document outcomes in input order
    pub results: Vec<BatchEntry>,

    /// Current status
    pub status: BatchStatus,
}

impl BatchJob {
    /// Create a running batch for the given documents
    pub fn new(batch_id: impl Into<String>, document_ids: Vec<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            results: Vec::with_capacity(document_ids.len()),
            document_ids,
            status: BatchStatus::Running,
        }
    }

    /// Record the outcomes (in input order) and settle the status
    pub fn complete(&mut self, results: Vec<BatchEntry>) {
        self.results = results;
        self.status = Self::settle(&self.results);
    }

    fn settle(results: &[BatchEntry]) -> BatchStatus {
        let failed = results.iter().filter(|e| !e.outcome.is_success()).count();
        if failed == 0 {
            BatchStatus::Completed
        } else if failed == results.len() {
            BatchStatus::Failed
        } else {
            BatchStatus::PartiallyFailed
        }
    }

    /// Outcome for a document id (first occurrence)
    pub fn result_for(&self, document_id: &str) -> Option<&BatchItemOutcome> {
        self.results
            .iter()
            .find(|e| e.document_id == document_id)
            .map(|e| &e.outcome)
    }

    /// Successful results in input order
    pub fn succeeded(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results.iter().filter_map(|e| e.outcome.result())
    }

    /// Failures in input order
    pub fn failed(&self) -> impl Iterator<Item = &ClassificationError> {
        self.results.iter().filter_map(|e| e.outcome.error())
    }

    /// Number of failed items
    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_entry(id: &str) -> BatchEntry {
        BatchEntry {
            document_id: id.to_string(),
            outcome: BatchItemOutcome::Classified(ClassificationResult::empty(id, 1, 0)),
        }
    }

    fn failed_entry(id: &str) -> BatchEntry {
        BatchEntry {
            document_id: id.to_string(),
            outcome: BatchItemOutcome::Failed(ClassificationError::new(id, "boom")),
        }
    }

    #[test]
    fn test_batch_status_settles() {
        let mut job = BatchJob::new("b1", vec!["a".into(), "b".into()]);
        assert_eq!(job.status, BatchStatus::Running);

        job.complete(vec![ok_entry("a"), ok_entry("b")]);
        assert_eq!(job.status, BatchStatus::Completed);

        job.complete(vec![ok_entry("a"), failed_entry("b")]);
        assert_eq!(job.status, BatchStatus::PartiallyFailed);
        assert_eq!(job.failure_count(), 1);

        job.complete(vec![failed_entry("a"), failed_entry("b")]);
        assert_eq!(job.status, BatchStatus::Failed);
    }

    #[test]
    fn test_document_deserializes_without_metadata() {
        let json = r#"{"id": "d1", "content": "hello"}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id, "d1");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_batch_entry_serialization() {
        let value = serde_json::to_value(failed_entry("x")).unwrap();
        assert_eq!(value["document_id"], "x");
        assert_eq!(value["outcome"]["status"], "failed");
        assert_eq!(value["outcome"]["reason"], "boom");
    }
}

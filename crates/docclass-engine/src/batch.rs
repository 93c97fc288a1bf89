//! Batch classification
//!
//! Fans a batch of documents out across a bounded pool of blocking workers
//! and gathers the outcomes back into input order. One rule snapshot is
//! taken before any work starts and shared by every item, so a batch never
//! sees a rule change halfway through.

use docclass_core::{
    BatchEntry, BatchItemOutcome, BatchJob, ClassificationError, Document, Error, Result,
};
use docclass_rules::{RuleSnapshot, RuleStore};
use docclass_telemetry::MetricsCollector;
use futures::future::join_all;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::DocumentClassifier;

/// Reason recorded for items that never started because the batch was cancelled
pub const CANCELLED_BEFORE_DISPATCH: &str = "cancelled before dispatch";

/// Default upper bound on documents per batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Runs batches of documents through a classifier
#[derive(Clone)]
pub struct BatchCoordinator {
    store: Arc<RuleStore>,
    classifier: Arc<dyn DocumentClassifier>,
    max_batch_size: usize,
    metrics: MetricsCollector,
}

impl BatchCoordinator {
    pub fn new(store: Arc<RuleStore>, classifier: Arc<dyn DocumentClassifier>) -> Self {
        Self {
            store,
            classifier,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Classify every document with at most `concurrency_limit` in flight
    ///
    /// Fails as a whole only when the request itself is invalid. Per-document
    /// failures, panics included, are reported in that document's slot.
    pub async fn classify_batch(
        &self,
        documents: Vec<Document>,
        concurrency_limit: usize,
    ) -> Result<BatchJob> {
        self.classify_batch_with_cancel(documents, concurrency_limit, CancellationToken::new())
            .await
    }

    /// Like [`classify_batch`](Self::classify_batch), but stops dispatching
    /// once `cancel` fires
    ///
    /// Items already running finish normally; items not yet started are
    /// reported as failed with [`CANCELLED_BEFORE_DISPATCH`].
    pub async fn classify_batch_with_cancel(
        &self,
        documents: Vec<Document>,
        concurrency_limit: usize,
        cancel: CancellationToken,
    ) -> Result<BatchJob> {
        self.validate(&documents, concurrency_limit)?;

        let snapshot = self.store.list_active_rules();
        self.run(documents, snapshot, concurrency_limit, cancel).await
    }

    fn validate(&self, documents: &[Document], concurrency_limit: usize) -> Result<()> {
        if documents.is_empty() {
            return Err(Error::validation("batch must contain at least one document"));
        }
        if documents.len() > self.max_batch_size {
            return Err(Error::validation(format!(
                "batch of {} documents exceeds the limit of {}",
                documents.len(),
                self.max_batch_size
            )));
        }
        if concurrency_limit == 0 {
            return Err(Error::validation("concurrency limit must be at least 1"));
        }
        Ok(())
    }

    async fn run(
        &self,
        documents: Vec<Document>,
        snapshot: Arc<RuleSnapshot>,
        concurrency_limit: usize,
        cancel: CancellationToken,
    ) -> Result<BatchJob> {
        let start = Instant::now();
        let batch_id = format!("batch-{}", uuid::Uuid::new_v4());
        let document_ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let total = documents.len();

        debug!(
            batch_id = %batch_id,
            documents = total,
            concurrency_limit,
            ruleset_version = snapshot.version(),
            classifier = self.classifier.name(),
            "Starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(concurrency_limit));
        let mut in_flight = Vec::with_capacity(total);

        for (index, document) in documents.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|_| Error::internal("batch worker pool closed"))?
                }
            };

            let classifier = Arc::clone(&self.classifier);
            let snapshot = Arc::clone(&snapshot);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                classifier.classify(&document, &snapshot)
            });
            in_flight.push(async move { (index, handle.await) });
        }

        let dispatched = in_flight.len();
        if dispatched < total {
            warn!(
                batch_id = %batch_id,
                dispatched,
                skipped = total - dispatched,
                "Batch cancelled before all documents were dispatched"
            );
        }

        let mut slots: Vec<Option<BatchItemOutcome>> = (0..total).map(|_| None).collect();
        for (index, joined) in join_all(in_flight).await {
            let document_id = &document_ids[index];
            let outcome = match joined {
                Ok(Ok(result)) => BatchItemOutcome::Classified(result),
                Ok(Err(e)) => {
                    warn!(
                        batch_id = %batch_id,
                        document_id = %document_id,
                        error = %e,
                        "Document failed"
                    );
                    BatchItemOutcome::Failed(ClassificationError::new(document_id, e.to_string()))
                }
                Err(e) => {
                    let reason = join_failure_reason(e);
                    warn!(
                        batch_id = %batch_id,
                        document_id = %document_id,
                        reason = %reason,
                        "Document worker failed"
                    );
                    BatchItemOutcome::Failed(ClassificationError::new(document_id, reason))
                }
            };
            slots[index] = Some(outcome);
        }

        let entries: Vec<BatchEntry> = slots
            .into_iter()
            .zip(document_ids.iter())
            .map(|(slot, document_id)| BatchEntry {
                document_id: document_id.clone(),
                outcome: slot.unwrap_or_else(|| {
                    BatchItemOutcome::Failed(ClassificationError::new(
                        document_id,
                        CANCELLED_BEFORE_DISPATCH,
                    ))
                }),
            })
            .collect();

        let mut job = BatchJob::new(batch_id, document_ids);
        job.complete(entries);

        let failed = job.failure_count();
        self.metrics.record_batch(total as u64, failed as u64);

        info!(
            batch_id = %job.batch_id,
            documents = total,
            failed,
            status = ?job.status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Batch finished"
        );

        Ok(job)
    }
}

fn join_failure_reason(err: JoinError) -> String {
    if err.is_panic() {
        format!("classifier panicked: {}", panic_message(err.into_panic()))
    } else {
        "classification task was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ClassificationEngine;
    use docclass_core::BatchStatus;
    use docclass_rules::{PredicateSpec, RuleDraft};

    async fn coordinator() -> BatchCoordinator {
        let store = Arc::new(RuleStore::default());
        store
            .add_rule(
                RuleDraft::new("inv", "finance", PredicateSpec::keywords(["invoice"]))
                    .with_id("inv"),
            )
            .await
            .unwrap();
        BatchCoordinator::new(store, Arc::new(ClassificationEngine::new()))
    }

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(format!("d{}", i), "invoice"))
            .collect()
    }

    #[tokio::test]
    async fn test_batch_classifies_in_order() {
        let job = coordinator().await.classify_batch(docs(5), 2).await.unwrap();

        assert_eq!(job.status, BatchStatus::Completed);
        let ids: Vec<&str> = job.results.iter().map(|e| e.document_id.as_str()).collect();
        assert_eq!(ids, vec!["d0", "d1", "d2", "d3", "d4"]);
        assert!(job.results.iter().all(|e| e.outcome.is_success()));
    }

    #[tokio::test]
    async fn test_invalid_requests_fail_whole_batch() {
        let coord = coordinator().await;
        assert_eq!(coord.classify_batch(Vec::new(), 2).await.unwrap_err().kind(), "validation");
        assert_eq!(coord.classify_batch(docs(1), 0).await.unwrap_err().kind(), "validation");
        assert_eq!(coord.classify_batch(docs(51), 4).await.unwrap_err().kind(), "validation");
        assert!(coord.classify_batch(docs(50), 4).await.is_ok());
    }

    #[tokio::test]
    async fn test_engine_errors_stay_in_their_slot() {
        let mut documents = docs(3);
        documents[1].id = " ".to_string();
        let job = coordinator().await.classify_batch(documents, 3).await.unwrap();

        assert_eq!(job.status, BatchStatus::PartiallyFailed);
        assert!(job.results[0].outcome.is_success());
        assert!(job.results[1].outcome.error().unwrap().reason.contains("blank"));
        assert!(job.results[2].outcome.is_success());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let job = coordinator()
            .await
            .classify_batch_with_cancel(docs(3), 1, token)
            .await
            .unwrap();

        assert_eq!(job.status, BatchStatus::Failed);
        for entry in &job.results {
            assert_eq!(entry.outcome.error().unwrap().reason, CANCELLED_BEFORE_DISPATCH);
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic");
    }
}

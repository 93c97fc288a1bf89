//! Mock classifiers for testing
//!
//! Provides configurable implementations of the DocumentClassifier trait
//! for exercising batch ordering, concurrency bounds, fault isolation, and
//! cancellation.

use docclass_core::{BatchStatus, ClassificationResult, Document, Error, FixedClock, Result};
use docclass_engine::{
    BatchCoordinator, ClassificationEngine, DocumentClassifier, CANCELLED_BEFORE_DISPATCH,
};
use docclass_rules::{PredicateSpec, RuleDraft, RulePatch, RuleSnapshot, RuleStore};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A configurable mock classifier that delegates scoring to the real engine
pub struct MockClassifier {
    engine: ClassificationEngine,
    latencies: HashMap<String, Duration>,
    panic_on: HashSet<String>,
    call_count: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            engine: ClassificationEngine::new().with_clock(Arc::new(FixedClock::new(0))),
            latencies: HashMap::new(),
            panic_on: HashSet::new(),
            call_count: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before classifying `document_id`
    pub fn with_latency(mut self, document_id: &str, latency: Duration) -> Self {
        self.latencies.insert(document_id.to_string(), latency);
        self
    }

    /// Panic when asked to classify `document_id`
    pub fn panic_on(mut self, document_id: &str) -> Self {
        self.panic_on.insert(document_id.to_string());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of documents classified at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Document ids in the order they finished
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

impl DocumentClassifier for MockClassifier {
    fn classify(
        &self,
        document: &Document,
        snapshot: &RuleSnapshot,
    ) -> Result<ClassificationResult> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latencies.get(&document.id) {
            std::thread::sleep(*latency);
        }

        if self.panic_on.contains(&document.id) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("evaluator fault on {}", document.id);
        }

        let result = self.engine.classify(document, snapshot);
        self.completed.lock().push(document.id.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A classifier that always fails - for testing error paths
pub struct FailingClassifier {
    error_message: String,
}

impl FailingClassifier {
    pub fn new(message: &str) -> Self {
        Self {
            error_message: message.to_string(),
        }
    }
}

impl DocumentClassifier for FailingClassifier {
    fn classify(
        &self,
        _document: &Document,
        _snapshot: &RuleSnapshot,
    ) -> Result<ClassificationResult> {
        Err(Error::internal(&self.error_message))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

async fn finance_store() -> Arc<RuleStore> {
    let store = Arc::new(RuleStore::default());
    store
        .add_rule(
            RuleDraft::new("inv", "finance", PredicateSpec::keywords(["invoice"])).with_id("inv"),
        )
        .await
        .unwrap();
    store
}

fn documents(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| Document::new(format!("d{}", i), "invoice"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_order_survives_skewed_completion() {
    let mock = Arc::new(
        MockClassifier::new()
            .with_latency("d0", Duration::from_millis(150))
            .with_latency("d2", Duration::from_millis(50)),
    );
    let coordinator = BatchCoordinator::new(finance_store().await, mock.clone());

    let job = coordinator.classify_batch(documents(3), 3).await.unwrap();

    // d1 had no delay, d0 the longest
    let finished = mock.completion_order();
    assert_eq!(finished.first().map(String::as_str), Some("d1"));
    assert_eq!(finished.last().map(String::as_str), Some("d0"));

    let ids: Vec<&str> = job.results.iter().map(|e| e.document_id.as_str()).collect();
    assert_eq!(ids, vec!["d0", "d1", "d2"]);
    for (entry, expected) in job.results.iter().zip(["d0", "d1", "d2"]) {
        assert_eq!(entry.outcome.result().unwrap().document_id, expected);
    }
    assert_eq!(job.status, BatchStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_faulting_item_is_isolated() {
    let mock = Arc::new(MockClassifier::new().panic_on("d2"));
    let coordinator = BatchCoordinator::new(finance_store().await, mock.clone());

    let job = coordinator.classify_batch(documents(5), 5).await.unwrap();

    assert_eq!(job.status, BatchStatus::PartiallyFailed);
    assert_eq!(job.succeeded().count(), 4);
    assert_eq!(job.failure_count(), 1);

    let failure = job.result_for("d2").unwrap().error().unwrap();
    assert_eq!(failure.document_id, "d2");
    assert!(failure.reason.contains("evaluator fault on d2"));

    for id in ["d0", "d1", "d3", "d4"] {
        let result = job.result_for(id).unwrap().result().unwrap();
        assert_eq!(result.primary_category(), Some("finance"));
    }
    assert_eq!(mock.call_count(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_limit_is_respected() {
    let mut mock = MockClassifier::new();
    for i in 0..8 {
        mock = mock.with_latency(&format!("d{}", i), Duration::from_millis(20));
    }
    let mock = Arc::new(mock);
    let coordinator = BatchCoordinator::new(finance_store().await, mock.clone());

    let job = coordinator.classify_batch(documents(8), 2).await.unwrap();

    assert_eq!(job.status, BatchStatus::Completed);
    assert!(mock.max_in_flight() <= 2);
    assert_eq!(mock.call_count(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_stops_dispatch_but_finishes_in_flight() {
    let mut mock = MockClassifier::new();
    for i in 0..4 {
        mock = mock.with_latency(&format!("d{}", i), Duration::from_millis(300));
    }
    let mock = Arc::new(mock);
    let coordinator = BatchCoordinator::new(finance_store().await, mock.clone());

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let job = coordinator
        .classify_batch_with_cancel(documents(4), 1, token)
        .await
        .unwrap();

    assert_eq!(job.status, BatchStatus::PartiallyFailed);
    assert!(job.results[0].outcome.is_success());
    for entry in &job.results[1..] {
        assert_eq!(entry.outcome.error().unwrap().reason, CANCELLED_BEFORE_DISPATCH);
    }
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_every_item_failing_marks_batch_failed() {
    let coordinator = BatchCoordinator::new(
        finance_store().await,
        Arc::new(FailingClassifier::new("backend unavailable")),
    );
    let job = coordinator.classify_batch(documents(3), 2).await.unwrap();

    assert_eq!(job.status, BatchStatus::Failed);
    assert!(job
        .failed()
        .all(|e| e.reason.contains("backend unavailable")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_uses_one_snapshot_across_rule_updates() {
    let mut mock = MockClassifier::new();
    for i in 0..4 {
        mock = mock.with_latency(&format!("d{}", i), Duration::from_millis(100));
    }
    let mock = Arc::new(mock);
    let store = finance_store().await;
    let version_before = store.ruleset_version();
    let coordinator = BatchCoordinator::new(Arc::clone(&store), mock);

    let batch = tokio::spawn(async move { coordinator.classify_batch(documents(4), 1).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    store
        .update_rule(
            "inv",
            RulePatch {
                category: Some("billing".to_string()),
                ..RulePatch::default()
            },
            1,
        )
        .await
        .unwrap();

    let job = batch.await.unwrap().unwrap();
    assert_eq!(job.status, BatchStatus::Completed);
    for result in job.succeeded() {
        assert_eq!(result.ruleset_version, version_before);
        assert_eq!(result.primary_category(), Some("finance"));
    }
    assert!(store.ruleset_version() > version_before);
}

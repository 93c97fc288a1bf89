//! Classification service
//!
//! The surface a web or CLI layer talks to. It ties the rule store, the
//! engine, the result cache, and the batch coordinator together, and keeps
//! aggregate statistics and metrics for everything it classifies.

use docclass_core::{BatchJob, ClassificationResult, Document, Error, Result};
use docclass_rules::{
    default_rules, Rule, RuleDraft, RulePatch, RuleRepository, RuleSnapshot, RuleStore,
};
use docclass_telemetry::{
    AuditEvent, ClassificationStats, MetricsCollector, MetricsSnapshot, StatsCollector,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::batch::BatchCoordinator;
use crate::cache::{CachedClassifier, ClassificationCache};
use crate::classifier::DocumentClassifier;
use crate::config::EngineConfig;
use crate::engine::ClassificationEngine;
use crate::suggestions::{self, Suggestion};

/// Classify a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub document: Document,
}

/// Classify several documents together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchClassificationRequest {
    pub documents: Vec<Document>,

    /// Workers to use; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,
}

/// Create a rule
pub type RuleCreateRequest = RuleDraft;

/// Patch a rule under optimistic concurrency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleUpdateRequest {
    pub id: String,
    pub patch: RulePatch,
    pub expected_version: u64,
}

/// Facade over rules, classification, and reporting
pub struct ClassificationService {
    config: EngineConfig,
    store: Arc<RuleStore>,
    classifier: Arc<CachedClassifier>,
    coordinator: BatchCoordinator,
    stats: StatsCollector,
    metrics: MetricsCollector,
}

impl ClassificationService {
    /// Build a service over an existing store
    pub fn new(store: Arc<RuleStore>, config: EngineConfig) -> Self {
        Self::with_engine(store, config, ClassificationEngine::new())
    }

    /// Build a service around a preconfigured engine (custom clock, shared metrics)
    pub fn with_engine(
        store: Arc<RuleStore>,
        config: EngineConfig,
        engine: ClassificationEngine,
    ) -> Self {
        let metrics = engine.metrics().clone();
        let classifier = Arc::new(CachedClassifier::new(
            engine,
            ClassificationCache::new(config.cache_capacity),
        ));
        let coordinator = BatchCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&classifier) as Arc<dyn DocumentClassifier>,
        )
        .with_max_batch_size(config.max_batch_size)
        .with_metrics(metrics.clone());

        Self {
            config,
            store,
            classifier,
            coordinator,
            stats: StatsCollector::new(),
            metrics,
        }
    }

    /// Open the repository, build a store, and seed it if configured to
    pub async fn open(repository: Arc<dyn RuleRepository>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = RuleStore::open(repository, config.rules).await?;
        if config.seed_default_rules {
            store.seed(default_rules()).await?;
        }
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Classify one document against the current rules
    pub fn classify(&self, request: ClassificationRequest) -> Result<ClassificationResult> {
        self.classify_document(&request.document)
    }

    pub fn classify_document(&self, document: &Document) -> Result<ClassificationResult> {
        let snapshot = self.store.list_active_rules();
        let result = self.classifier.classify(document, &snapshot)?;
        self.stats.record(&result);
        Ok(result)
    }

    /// Classify a batch; per-document failures are reported in the job
    pub async fn classify_batch(&self, request: BatchClassificationRequest) -> Result<BatchJob> {
        self.classify_batch_with_cancel(request, CancellationToken::new())
            .await
    }

    pub async fn classify_batch_with_cancel(
        &self,
        request: BatchClassificationRequest,
        cancel: CancellationToken,
    ) -> Result<BatchJob> {
        let concurrency = self.resolve_concurrency(request.concurrency_limit)?;
        let job = self
            .coordinator
            .classify_batch_with_cancel(request.documents, concurrency, cancel)
            .await?;

        for result in job.succeeded() {
            self.stats.record(result);
        }
        Ok(job)
    }

    fn resolve_concurrency(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            Some(0) => Err(Error::validation("concurrency limit must be at least 1")),
            Some(n) => Ok(n.min(self.config.max_concurrency)),
            None => Ok(self.config.default_concurrency()),
        }
    }

    /// Rule-level category suggestions for a document, best first
    pub fn suggest(&self, document: &Document, limit: Option<usize>) -> Result<Vec<Suggestion>> {
        if document.id.trim().is_empty() {
            return Err(Error::engine("document id must not be blank"));
        }
        let snapshot = self.store.list_active_rules();
        let limit = limit.unwrap_or(self.config.suggestion_limit);
        Ok(suggestions::suggest(document, &snapshot, limit))
    }

    pub async fn add_rule(&self, request: RuleCreateRequest) -> Result<Rule> {
        let rule = self.store.add_rule(request).await?;
        self.after_mutation("create");
        Ok(rule)
    }

    pub async fn update_rule(&self, request: RuleUpdateRequest) -> Result<Rule> {
        let rule = self
            .store
            .update_rule(&request.id, request.patch, request.expected_version)
            .await?;
        self.after_mutation("update");
        Ok(rule)
    }

    pub async fn disable_rule(&self, id: &str) -> Result<Rule> {
        let rule = self.store.disable_rule(id).await?;
        self.after_mutation("disable");
        Ok(rule)
    }

    fn after_mutation(&self, op: &'static str) {
        self.metrics.record_rule_mutation(op);
        // Entries for older rule set versions can never be hit again
        self.classifier.cache().invalidate_all();
        info!(op, ruleset_version = self.store.ruleset_version(), "Rule set changed");
    }

    pub fn get_rule(&self, id: &str) -> Result<Rule> {
        self.store.get_rule(id)
    }

    pub fn list_rules(&self) -> Vec<Rule> {
        self.store.list_rules()
    }

    pub fn list_active_rules(&self) -> Arc<RuleSnapshot> {
        self.store.list_active_rules()
    }

    pub fn audit_trail(&self) -> Vec<AuditEvent> {
        self.store.audit_trail()
    }

    pub fn stats(&self) -> ClassificationStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

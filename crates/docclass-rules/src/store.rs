//! Versioned rule store
//!
//! Readers never take a lock longer than an `Arc` clone: the store publishes
//! an immutable [`RuleSnapshot`] behind a single pointer and writers build
//! the next state off to the side, persist it, and then swap the pointer.
//! Writers are serialized by an async mutex because persistence may await.

use docclass_core::{Clock, Error, Result, SystemClock};
use docclass_telemetry::{AuditEvent, AuditTrail, RuleOperation};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::repository::{InMemoryRuleRepository, RuleRepository};
use crate::rule::{CompiledRule, Rule, RuleDraft, RuleLimits, RulePatch};

/// Immutable view of the enabled rules at one rule set version
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    version: u64,
    rules: Vec<Arc<CompiledRule>>,
}

impl RuleSnapshot {
    /// Build a snapshot from compiled rules
    ///
    /// Disabled rules are dropped; the rest are ordered by priority, then id.
    pub fn new(version: u64, rules: impl IntoIterator<Item = Arc<CompiledRule>>) -> Self {
        let mut rules: Vec<_> = rules.into_iter().filter(|r| r.rule.enabled).collect();
        rules.sort_by(|a, b| {
            a.rule
                .priority
                .cmp(&b.rule.priority)
                .then_with(|| a.rule.id.cmp(&b.rule.id))
        });
        Self { version, rules }
    }

    /// Compile plain rules into a snapshot
    pub fn from_rules(version: u64, rules: Vec<Rule>, limits: &RuleLimits) -> Result<Self> {
        let compiled = rules
            .iter()
            .map(|r| r.compile(limits).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(version, compiled))
    }

    /// Snapshot with no rules
    pub fn empty(version: u64) -> Self {
        Self {
            version,
            rules: Vec::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Enabled rules in evaluation order
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Plain rule values, for listing
    pub fn to_rules(&self) -> Vec<Rule> {
        self.rules.iter().map(|r| r.rule.clone()).collect()
    }
}

/// Everything readers can observe, swapped as one unit
#[derive(Debug, Default)]
struct Published {
    catalog: BTreeMap<String, Arc<CompiledRule>>,
    snapshot: Arc<RuleSnapshot>,
}

impl Published {
    fn build(version: u64, catalog: BTreeMap<String, Arc<CompiledRule>>) -> Self {
        let snapshot = Arc::new(RuleSnapshot::new(version, catalog.values().cloned()));
        Self { catalog, snapshot }
    }

    fn version(&self) -> u64 {
        self.snapshot.version
    }

    fn with_rule(&self, rule: Arc<CompiledRule>) -> Self {
        let mut catalog = self.catalog.clone();
        catalog.insert(rule.rule.id.clone(), rule);
        Self::build(self.version() + 1, catalog)
    }
}

/// Runtime-mutable, versioned collection of rules
pub struct RuleStore {
    repository: Arc<dyn RuleRepository>,
    limits: RuleLimits,
    clock: Arc<dyn Clock>,
    writer: tokio::sync::Mutex<()>,
    published: RwLock<Arc<Published>>,
    audit: Mutex<AuditTrail>,
}

impl RuleStore {
    /// Create an empty store backed by memory
    pub fn new(limits: RuleLimits) -> Self {
        Self::with_parts(
            Arc::new(InMemoryRuleRepository::new()),
            limits,
            Published::build(1, BTreeMap::new()),
        )
    }

    /// Open a store over a repository, loading and validating its rules
    pub async fn open(repository: Arc<dyn RuleRepository>, limits: RuleLimits) -> Result<Self> {
        let rules = repository.load_all().await?;

        let mut catalog = BTreeMap::new();
        let mut audit = AuditTrail::new();
        let loaded_at = SystemClock.now_ms();
        for rule in rules {
            let compiled = rule.compile(&limits)?;
            if catalog.contains_key(&rule.id) {
                return Err(Error::validation(format!(
                    "repository contains duplicate rule id '{}'",
                    rule.id
                )));
            }
            audit.add_event(
                AuditEvent::new(RuleOperation::Loaded, &rule.id, loaded_at)
                    .with_versions(rule.version, 1),
            );
            catalog.insert(rule.id.clone(), Arc::new(compiled));
        }

        info!(
            repository = repository.name(),
            rules = catalog.len(),
            "Rule store opened"
        );

        let store = Self::with_parts(repository, limits, Published::build(1, catalog));
        *store.audit.lock() = audit;
        Ok(store)
    }

    fn with_parts(
        repository: Arc<dyn RuleRepository>,
        limits: RuleLimits,
        published: Published,
    ) -> Self {
        Self {
            repository,
            limits,
            clock: Arc::new(SystemClock),
            writer: tokio::sync::Mutex::new(()),
            published: RwLock::new(Arc::new(published)),
            audit: Mutex::new(AuditTrail::new()),
        }
    }

    /// Use a different clock for rule timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limits(&self) -> &RuleLimits {
        &self.limits
    }

    fn current(&self) -> Arc<Published> {
        Arc::clone(&self.published.read())
    }

    fn publish(&self, next: Published) -> u64 {
        let version = next.version();
        *self.published.write() = Arc::new(next);
        version
    }

    fn record(&self, operation: RuleOperation, rule: &Rule, ruleset_version: u64) {
        let event = AuditEvent::new(operation, &rule.id, self.clock.now_ms())
            .with_versions(rule.version, ruleset_version)
            .with_data(rule);
        self.audit.lock().add_event(event);
    }

    /// Validate, persist, and publish a new rule
    pub async fn add_rule(&self, draft: RuleDraft) -> Result<Rule> {
        let _guard = self.writer.lock().await;
        self.insert(draft).await
    }

    /// Caller holds `writer`
    async fn insert(&self, draft: RuleDraft) -> Result<Rule> {
        let rule = draft.into_rule(self.clock.now_ms());
        let compiled = rule.compile(&self.limits)?;

        let current = self.current();
        if current.catalog.contains_key(&rule.id) {
            return Err(Error::validation(format!("rule id '{}' already exists", rule.id)));
        }

        self.repository.save(&rule).await?;
        let version = self.publish(current.with_rule(Arc::new(compiled)));
        self.record(RuleOperation::Created, &rule, version);

        info!(
            rule_id = %rule.id,
            category = %rule.category,
            ruleset_version = version,
            "Added classification rule"
        );
        Ok(rule)
    }

    /// Patch a rule if `expected_version` matches the stored version
    pub async fn update_rule(
        &self,
        id: &str,
        patch: RulePatch,
        expected_version: u64,
    ) -> Result<Rule> {
        let _guard = self.writer.lock().await;

        let current = self.current();
        let existing = current
            .catalog
            .get(id)
            .ok_or_else(|| Error::not_found(format!("rule '{}'", id)))?;

        if existing.rule.version != expected_version {
            warn!(
                rule_id = %id,
                expected = expected_version,
                actual = existing.rule.version,
                "Rejected stale rule update"
            );
            return Err(Error::conflict(id, expected_version, existing.rule.version));
        }

        let rule = existing.rule.patched(patch, self.clock.now_ms());
        let compiled = rule.compile(&self.limits)?;

        self.repository.save(&rule).await?;
        let version = self.publish(current.with_rule(Arc::new(compiled)));
        self.record(RuleOperation::Updated, &rule, version);

        info!(
            rule_id = %rule.id,
            rule_version = rule.version,
            ruleset_version = version,
            "Updated classification rule"
        );
        Ok(rule)
    }

    /// Take a rule out of classification without deleting it
    pub async fn disable_rule(&self, id: &str) -> Result<Rule> {
        let _guard = self.writer.lock().await;

        let current = self.current();
        let existing = current
            .catalog
            .get(id)
            .ok_or_else(|| Error::not_found(format!("rule '{}'", id)))?;

        if !existing.rule.enabled {
            debug!(rule_id = %id, "Rule already disabled");
            return Ok(existing.rule.clone());
        }

        let patch = RulePatch {
            enabled: Some(false),
            ..RulePatch::default()
        };
        let rule = existing.rule.patched(patch, self.clock.now_ms());
        let compiled = rule.compile(&self.limits)?;

        self.repository.save(&rule).await?;
        let version = self.publish(current.with_rule(Arc::new(compiled)));
        self.record(RuleOperation::Disabled, &rule, version);

        info!(rule_id = %id, ruleset_version = version, "Disabled classification rule");
        Ok(rule)
    }

    /// Add each draft if the store holds no rules yet
    ///
    /// Returns the number of rules added.
    pub async fn seed(&self, drafts: Vec<RuleDraft>) -> Result<usize> {
        let _guard = self.writer.lock().await;
        if !self.current().catalog.is_empty() {
            debug!("Rule store already populated, skipping seed");
            return Ok(0);
        }

        let count = drafts.len();
        for draft in drafts {
            self.insert(draft).await?;
        }
        info!(count, "Seeded rule store");
        Ok(count)
    }

    /// Atomic snapshot of the enabled rules and the rule set version
    pub fn list_active_rules(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.published.read().snapshot)
    }

    /// Current rule set version
    pub fn ruleset_version(&self) -> u64 {
        self.published.read().version()
    }

    /// Look up a rule, enabled or not
    pub fn get_rule(&self, id: &str) -> Result<Rule> {
        self.current()
            .catalog
            .get(id)
            .map(|r| r.rule.clone())
            .ok_or_else(|| Error::not_found(format!("rule '{}'", id)))
    }

    /// Every rule, including disabled ones, ordered by priority then id
    pub fn list_rules(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .current()
            .catalog
            .values()
            .map(|r| r.rule.clone())
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    /// Copy of the audit events recorded so far
    pub fn audit_trail(&self) -> Vec<AuditEvent> {
        self.audit.lock().events().to_vec()
    }

    /// Check the audit chain for tampering
    pub fn verify_audit(&self) -> bool {
        self.audit.lock().verify()
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(RuleLimits::default())
    }
}

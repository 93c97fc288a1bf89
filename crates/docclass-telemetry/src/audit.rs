//! Hash-chained audit trail of rule mutations
//!
//! Rules are never deleted; every create, update, and disable is appended
//! here so the history of a rule set can be reconstructed and checked for
//! tampering.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Audit trail with hash-chained events for tamper detection
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Vec<AuditEvent>,
    chain_hash: Option<String>,
}

impl AuditTrail {
    /// Create a new audit trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the audit trail
    pub fn add_event(&mut self, event: AuditEvent) {
        let mut event = event;
        event.previous_hash = self.chain_hash.clone();

        let hash = Self::compute_hash(&event);
        event.hash = Some(hash.clone());

        tracing::debug!(
            operation = %event.operation,
            rule_id = %event.rule_id,
            ruleset_version = event.ruleset_version,
            "Recorded rule audit event"
        );

        self.chain_hash = Some(hash);
        self.events.push(event);
    }

    /// Verify the integrity of the audit trail
    pub fn verify(&self) -> bool {
        let mut prev_hash: Option<String> = None;

        for event in &self.events {
            if event.previous_hash != prev_hash {
                return false;
            }

            let computed_hash = Self::compute_hash(event);
            if event.hash.as_ref() != Some(&computed_hash) {
                return false;
            }

            prev_hash = event.hash.clone();
        }

        true
    }

    /// Get all events
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Events touching a single rule, oldest first
    pub fn history(&self, rule_id: &str) -> Vec<&AuditEvent> {
        self.events.iter().filter(|e| e.rule_id == rule_id).collect()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Hash of the newest event
    pub fn head(&self) -> Option<&str> {
        self.chain_hash.as_deref()
    }

    fn compute_hash(event: &AuditEvent) -> String {
        let mut hasher = Sha256::new();

        // Everything except the hash field itself
        hasher.update(event.operation.as_str().as_bytes());
        hasher.update(event.rule_id.as_bytes());
        hasher.update(event.rule_version.to_le_bytes());
        hasher.update(event.ruleset_version.to_le_bytes());
        if let Some(ref data) = event.data {
            hasher.update(data.as_bytes());
        }
        hasher.update(event.timestamp_ms.to_le_bytes());
        if let Some(ref prev) = event.previous_hash {
            hasher.update(prev.as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

/// Kind of rule mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOperation {
    Created,
    Updated,
    Disabled,
    Loaded,
}

impl RuleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Disabled => "disabled",
            Self::Loaded => "loaded",
        }
    }
}

impl std::fmt::Display for RuleOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit event in the trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// What happened
    pub operation: RuleOperation,

    /// Rule the event concerns
    pub rule_id: String,

    /// Rule version after the mutation
    pub rule_version: u64,

    /// Rule set version published by the mutation
    pub ruleset_version: u64,

    /// Event data (JSON serialized rule state)
    pub data: Option<String>,

    /// Unix millis
    pub timestamp_ms: i64,

    /// Hash of this event
    pub hash: Option<String>,

    /// Hash of previous event (for chaining)
    pub previous_hash: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event stamped at `timestamp_ms`
    pub fn new(operation: RuleOperation, rule_id: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            operation,
            rule_id: rule_id.into(),
            rule_version: 0,
            ruleset_version: 0,
            data: None,
            timestamp_ms,
            hash: None,
            previous_hash: None,
        }
    }

    /// Set the rule and rule set versions
    pub fn with_versions(mut self, rule_version: u64, ruleset_version: u64) -> Self {
        self.rule_version = rule_version;
        self.ruleset_version = ruleset_version;
        self
    }

    /// Set event data
    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_string(&data).ok();
        self
    }
}

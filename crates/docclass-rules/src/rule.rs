//! Rule definitions

use docclass_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::predicate::{Predicate, PredicateLimits, PredicateSpec};

/// A published classification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Test applied to documents
    pub predicate: PredicateSpec,

    /// Category assigned when the predicate matches
    pub category: String,

    /// Contribution multiplier (> 0)
    pub weight: f64,

    /// Tie-break order; lower numbers rank first
    #[serde(default)]
    pub priority: i32,

    /// Whether the rule takes part in classification
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Optimistic-concurrency version, bumped on every change
    #[serde(default = "default_version")]
    pub version: u64,

    #[serde(default)]
    pub created_at_ms: i64,

    #[serde(default)]
    pub updated_at_ms: i64,
}

impl Rule {
    /// Validate every field and compile the predicate
    pub fn compile(&self, limits: &RuleLimits) -> Result<CompiledRule> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("rule id must not be blank"));
        }
        validate_fields(&self.name, &self.category, self.weight, limits)?;
        let predicate = Predicate::compile(&self.predicate, &limits.predicate)
            .map_err(|e| prefix_rule(&self.id, e))?;

        Ok(CompiledRule {
            rule: self.clone(),
            predicate,
        })
    }

    /// Apply a patch, producing the next version of this rule
    pub fn patched(&self, patch: RulePatch, now_ms: i64) -> Rule {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(predicate) = patch.predicate {
            next.predicate = predicate;
        }
        if let Some(category) = patch.category {
            next.category = category;
        }
        if let Some(weight) = patch.weight {
            next.weight = weight;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(enabled) = patch.enabled {
            next.enabled = enabled;
        }
        next.version = self.version + 1;
        next.updated_at_ms = now_ms;
        next
    }
}

/// A rule together with its compiled predicate
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    pub predicate: Predicate,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn category(&self) -> &str {
        &self.rule.category
    }
}

/// Request to create a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    /// Caller-chosen id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    pub predicate: PredicateSpec,

    pub category: String,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleDraft {
    /// Create an enabled draft with the default weight and priority 0
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        predicate: PredicateSpec,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            predicate,
            category: category.into(),
            weight: default_weight(),
            priority: 0,
            enabled: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Turn the draft into a version-1 rule
    pub fn into_rule(self, now_ms: i64) -> Rule {
        Rule {
            id: self.id.unwrap_or_else(|| format!("rule-{}", uuid::Uuid::new_v4())),
            name: self.name,
            predicate: self.predicate,
            category: self.category,
            weight: self.weight,
            priority: self.priority,
            enabled: self.enabled,
            version: 1,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

/// Partial update to a rule; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<PredicateSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Authoring limits applied to every rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleLimits {
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    #[serde(default = "default_max_category_len")]
    pub max_category_len: usize,

    #[serde(default)]
    pub predicate: PredicateLimits,
}

impl Default for RuleLimits {
    fn default() -> Self {
        Self {
            max_name_len: default_max_name_len(),
            max_category_len: default_max_category_len(),
            predicate: PredicateLimits::default(),
        }
    }
}

/// A named collection of rule drafts, loadable from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub rules: Vec<RuleDraft>,
}

impl RuleSet {
    /// Load a rule set from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a rule set from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

fn validate_fields(name: &str, category: &str, weight: f64, limits: &RuleLimits) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("rule name must not be blank"));
    }
    if name.chars().count() > limits.max_name_len {
        return Err(Error::validation(format!(
            "rule name exceeds {} characters",
            limits.max_name_len
        )));
    }
    if category.trim().is_empty() {
        return Err(Error::validation("rule category must not be blank"));
    }
    if category.chars().count() > limits.max_category_len {
        return Err(Error::validation(format!(
            "rule category exceeds {} characters",
            limits.max_category_len
        )));
    }
    if !weight.is_finite() || weight <= 0.0 {
        return Err(Error::validation(format!(
            "rule weight must be a finite number > 0, got {}",
            weight
        )));
    }
    Ok(())
}

fn prefix_rule(rule_id: &str, err: Error) -> Error {
    match err {
        Error::Validation(msg) => Error::validation(format!("rule '{}': {}", rule_id, msg)),
        other => other,
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> u64 {
    1
}

fn default_weight() -> f64 {
    0.9
}

fn default_max_name_len() -> usize {
    100
}

fn default_max_category_len() -> usize {
    50
}

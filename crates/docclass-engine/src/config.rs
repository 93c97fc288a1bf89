//! Engine configuration

use docclass_core::{Error, Result};
use docclass_rules::RuleLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum cached results; 0 disables the cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Concurrency used when a batch request does not name one; the CPU
    /// count capped at `max_concurrency` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_concurrency: Option<usize>,

    /// Upper bound applied to any requested concurrency
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Largest batch accepted in one request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Number of suggestions returned when the caller does not ask for a count
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Authoring limits for rules
    #[serde(default)]
    pub rules: RuleLimits,

    /// Populate an empty rule store with the built-in starter rules
    #[serde(default)]
    pub seed_default_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            default_concurrency: None,
            max_concurrency: default_max_concurrency(),
            max_batch_size: default_max_batch_size(),
            suggestion_limit: default_suggestion_limit(),
            rules: RuleLimits::default(),
            seed_default_rules: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Concurrency for batches that do not request one
    pub fn default_concurrency(&self) -> usize {
        self.default_concurrency
            .unwrap_or_else(available_workers)
            .min(self.max_concurrency)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.default_concurrency == Some(0) || self.max_concurrency == 0 {
            return Err(Error::config("concurrency settings must be at least 1"));
        }
        if let Some(default) = self.default_concurrency {
            if default > self.max_concurrency {
                return Err(Error::config(format!(
                    "default_concurrency ({}) exceeds max_concurrency ({})",
                    default, self.max_concurrency
                )));
            }
        }
        if self.max_batch_size == 0 {
            return Err(Error::config("max_batch_size must be at least 1"));
        }
        if self.suggestion_limit == 0 {
            return Err(Error::config("suggestion_limit must be at least 1"));
        }
        Ok(())
    }
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn available_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_max_concurrency() -> usize {
    available_workers().max(64)
}

fn default_max_batch_size() -> usize {
    50
}

fn default_suggestion_limit() -> usize {
    5
}

//! Rule persistence
//!
//! The store treats persistence as an injected collaborator. Two
//! implementations ship here: an in-memory repository for tests and
//! embedding, and a YAML file repository that rewrites the whole rule file
//! atomically on every save.

use async_trait::async_trait;
use docclass_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::rule::Rule;

/// Storage backend for rules
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Load every stored rule, enabled or not
    async fn load_all(&self) -> Result<Vec<Rule>>;

    /// Insert or replace a rule by id
    async fn save(&self, rule: &Rule) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Repository that keeps rules in memory only
#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: Mutex<BTreeMap<String, Rule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the repository
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: Mutex::new(rules.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn load_all(&self) -> Result<Vec<Rule>> {
        Ok(self.rules.lock().await.values().cloned().collect())
    }

    async fn save(&self, rule: &Rule) -> Result<()> {
        self.rules.lock().await.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// Repository backed by a single YAML file
pub struct YamlRuleRepository {
    path: PathBuf,
    rules: Mutex<BTreeMap<String, Rule>>,
}

impl YamlRuleRepository {
    /// Open (or lazily create) the rule file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let rules = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let file: RuleFile = serde_yaml::from_str(&content).map_err(|e| {
                    Error::repository(format!("failed to parse {}: {}", path.display(), e))
                })?;
                file.rules
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Rule file does not exist yet");
                Vec::new()
            }
            Err(e) => {
                return Err(Error::repository(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        info!(path = %path.display(), count = rules.len(), "Opened YAML rule repository");

        Ok(Self {
            path,
            rules: Mutex::new(rules.into_iter().map(|r| (r.id.clone(), r)).collect()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_file(&self, rules: &BTreeMap<String, Rule>) -> Result<()> {
        let file = RuleFile {
            rules: rules.values().cloned().collect(),
        };
        let yaml = serde_yaml::to_string(&file)?;

        let tmp = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|e| Error::repository(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::repository(format!("failed to replace {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl RuleRepository for YamlRuleRepository {
    async fn load_all(&self) -> Result<Vec<Rule>> {
        Ok(self.rules.lock().await.values().cloned().collect())
    }

    async fn save(&self, rule: &Rule) -> Result<()> {
        let mut rules = self.rules.lock().await;
        let previous = rules.insert(rule.id.clone(), rule.clone());

        if let Err(e) = self.write_file(&rules).await {
            // Keep memory in line with what is on disk
            match previous {
                Some(previous) => rules.insert(rule.id.clone(), previous),
                None => rules.remove(&rule.id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "yaml"
    }
}

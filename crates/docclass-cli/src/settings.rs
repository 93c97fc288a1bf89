//! CLI settings
//!
//! Layered: built-in defaults, then the YAML config file (if present), then
//! `DOCCLASS__*` environment variables, then command-line flags.

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use docclass_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::Cli;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// YAML file holding the rule set; rules live in memory only when unset
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Print the Prometheus exposition to stderr before exiting
    #[serde(default)]
    pub render_on_exit: bool,
}

impl AppConfig {
    /// Load configuration from file, environment, and CLI overrides
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::load_layers(cli.config.as_deref(), None)?;
        config.apply_cli(cli);
        config
            .engine
            .validate()
            .context("invalid engine configuration")?;
        Ok(config)
    }

    /// Merge defaults, the config file, and the environment
    ///
    /// `env` replaces the process environment when given.
    pub fn load_layers(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> anyhow::Result<Self> {
        let defaults = serde_json::to_string(&Self::default())?;
        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));

        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        } else if Path::new("docclass.yaml").exists() {
            builder = builder.add_source(File::new("docclass.yaml", FileFormat::Yaml));
        }

        // DOCCLASS__ENGINE__CACHE_CAPACITY=0
        builder = builder.add_source(
            Environment::with_prefix("DOCCLASS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build().context("failed to assemble configuration")?;
        config
            .try_deserialize()
            .context("failed to parse configuration")
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(rules) = &cli.rules {
            self.rules_file = Some(rules.clone());
        }
        if cli.memory {
            self.rules_file = None;
        }
        if cli.seed_defaults {
            self.engine.seed_default_rules = true;
        }
        if cli.json_logs {
            self.logging.json = true;
        }
        if cli.metrics {
            self.metrics.render_on_exit = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::load_layers(None, Some(HashMap::new())).unwrap();
        assert_eq!(config.engine.max_batch_size, 50);
        assert!(config.rules_file.is_none());
        assert!(!config.logging.json);
    }

    #[test]
    fn test_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docclass.yaml");
        std::fs::write(
            &path,
            "engine:\n  max_batch_size: 20\n  cache_capacity: 5\n\
             rules_file: rules.yaml\nlogging:\n  json: true\n",
        )
        .unwrap();

        let env = HashMap::from([(
            "DOCCLASS__ENGINE__CACHE_CAPACITY".to_string(),
            "0".to_string(),
        )]);
        let config = AppConfig::load_layers(Some(&path), Some(env)).unwrap();

        assert_eq!(config.engine.max_batch_size, 20);
        assert_eq!(config.engine.cache_capacity, 0);
        assert_eq!(config.rules_file, Some(PathBuf::from("rules.yaml")));
        assert!(config.logging.json);
        assert_eq!(config.engine.suggestion_limit, 5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load_layers(Some(Path::new("/nonexistent/docclass.yaml")), None);
        assert!(err.is_err());
    }
}

//! Subcommand handlers

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use docclass_core::Document;
use docclass_engine::{
    BatchClassificationRequest, ClassificationRequest, ClassificationService, RuleUpdateRequest,
};
use docclass_rules::{
    InMemoryRuleRepository, RulePatch, RuleRepository, RuleSet, YamlRuleRepository,
};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::settings::AppConfig;
use crate::Command;

/// Where a single document comes from
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Document id
    #[arg(long, default_value = "cli")]
    pub id: String,

    /// Document text (reads stdin when neither --content nor --file is given)
    #[arg(long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read the document text from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Metadata entry, repeatable
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_metadata)]
    pub metadata: Vec<(String, String)>,
}

impl DocumentArgs {
    fn into_document(self) -> Result<Document> {
        let content = match (self.content, &self.file) {
            (Some(content), _) => content,
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            (None, None) => {
                let mut content = String::new();
                std::io::stdin().read_to_string(&mut content)?;
                content
            }
        };

        Ok(self
            .metadata
            .into_iter()
            .fold(Document::new(self.id, content), |doc, (k, v)| doc.with_metadata(k, v)))
    }
}

fn parse_metadata(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub document: DocumentArgs,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Maximum suggestions (configured default when omitted)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// JSON or YAML file holding a list of documents
    pub input: PathBuf,

    /// Documents classified at once (configured default when omitted)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Stop dispatching new documents after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print aggregate statistics after the batch
    #[arg(long)]
    pub stats: bool,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List rules
    List {
        /// Only rules currently used for classification
        #[arg(long)]
        active: bool,
    },

    /// Show one rule
    Show { id: String },

    /// Add every rule in a YAML rule set file
    Add { file: PathBuf },

    /// Patch a rule; fails if it changed since `expected_version`
    Update {
        id: String,

        #[arg(long)]
        expected_version: u64,

        /// JSON object with the fields to change
        #[arg(long)]
        patch: String,
    },

    /// Disable a rule
    Disable { id: String },

    /// Print the rule audit trail and check its integrity
    Audit,
}

/// Open the configured repository and build the service over it
pub async fn build_service(config: &AppConfig) -> Result<ClassificationService> {
    let repository: Arc<dyn RuleRepository> = match &config.rules_file {
        Some(path) => Arc::new(YamlRuleRepository::open(path).await?),
        None => Arc::new(InMemoryRuleRepository::new()),
    };

    let service = ClassificationService::open(repository, config.engine.clone()).await?;
    info!(
        rules = service.list_rules().len(),
        ruleset_version = service.store().ruleset_version(),
        "Rule store ready"
    );
    Ok(service)
}

pub async fn run(service: &ClassificationService, command: Command) -> Result<()> {
    match command {
        Command::Classify(args) => {
            let document = args.document.into_document()?;
            let result = service.classify(ClassificationRequest { document })?;
            print_json(&result)
        }

        Command::Suggest(args) => {
            let document = args.document.into_document()?;
            let suggestions = service.suggest(&document, args.limit)?;
            print_json(&suggestions)
        }

        Command::Batch(args) => run_batch(service, args).await,

        Command::Rules(command) => run_rules(service, command).await,
    }
}

async fn run_batch(service: &ClassificationService, args: BatchArgs) -> Result<()> {
    let documents = load_documents(&args.input)?;

    let cancel = CancellationToken::new();
    if let Some(timeout_ms) = args.timeout_ms {
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            warn!(timeout_ms, "Batch timeout reached, cancelling");
            trigger.cancel();
        });
    }

    let job = service
        .classify_batch_with_cancel(
            BatchClassificationRequest {
                documents,
                concurrency_limit: args.concurrency,
            },
            cancel,
        )
        .await?;
    print_json(&job)?;

    if args.stats {
        print_json(&service.stats())?;
    }
    Ok(())
}

fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    // JSON is valid YAML, so one parser covers both
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse documents from {}", path.display()))
}

async fn run_rules(service: &ClassificationService, command: RulesCommand) -> Result<()> {
    match command {
        RulesCommand::List { active } => {
            if active {
                print_json(&service.list_active_rules().to_rules())
            } else {
                print_json(&service.list_rules())
            }
        }

        RulesCommand::Show { id } => print_json(&service.get_rule(&id)?),

        RulesCommand::Add { file } => {
            let set = RuleSet::from_file(&file)
                .with_context(|| format!("failed to load rule set {}", file.display()))?;
            let mut added = Vec::with_capacity(set.rules.len());
            for draft in set.rules {
                added.push(service.add_rule(draft).await?);
            }
            print_json(&added)
        }

        RulesCommand::Update {
            id,
            expected_version,
            patch,
        } => {
            let patch: RulePatch =
                serde_json::from_str(&patch).context("--patch must be a JSON object")?;
            if patch.is_empty() {
                bail!("--patch does not change anything");
            }
            let rule = service
                .update_rule(RuleUpdateRequest {
                    id,
                    patch,
                    expected_version,
                })
                .await?;
            print_json(&rule)
        }

        RulesCommand::Disable { id } => print_json(&service.disable_rule(&id).await?),

        RulesCommand::Audit => {
            let events = service.audit_trail();
            print_json(&events)?;
            if !service.store().verify_audit() {
                bail!("audit trail failed verification");
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert_eq!(
            parse_metadata("source=fax").unwrap(),
            ("source".to_string(), "fax".to_string())
        );
        assert_eq!(
            parse_metadata("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_metadata("novalue").is_err());
        assert!(parse_metadata("=x").is_err());
    }

    #[test]
    fn test_load_documents_accepts_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("docs.json");
        std::fs::write(&json, r#"[{"id": "a", "content": "invoice"}, {"id": "b"}]"#).unwrap();
        let docs = load_documents(&json).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].content, "");

        let yaml = dir.path().join("docs.yaml");
        std::fs::write(
            &yaml,
            "- id: a\n  content: invoice\n  metadata:\n    source: fax\n",
        )
        .unwrap();
        let docs = load_documents(&yaml).unwrap();
        assert_eq!(docs[0].metadata.get("source").map(String::as_str), Some("fax"));
    }
}

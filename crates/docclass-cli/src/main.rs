//! docclass CLI
//!
//! Command-line front end for rule-based document classification.
//!
//! Rules are kept in a YAML file (or in memory) and documents are classified
//! one at a time or in batches. Results are written to stdout as JSON; logs
//! go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use tracing::info;

mod commands;
mod settings;

use settings::{AppConfig, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "docclass")]
#[command(about = "Rule-based document classification", long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults to ./docclass.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Rule file to load and persist rules to
    #[arg(short, long, global = true)]
    pub rules: Option<PathBuf>,

    /// Keep rules in memory only, ignoring any configured rule file
    #[arg(long, global = true, conflicts_with = "rules")]
    pub memory: bool,

    /// Seed an empty rule store with the built-in starter rules
    #[arg(long, global = true)]
    pub seed_defaults: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify a single document
    Classify(commands::ClassifyArgs),

    /// Classify a batch of documents from a JSON or YAML file
    Batch(commands::BatchArgs),

    /// Suggest categories for a document
    Suggest(commands::SuggestArgs),

    /// Inspect and edit rules
    #[command(subcommand)]
    Rules(commands::RulesCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli)?;

    init_tracing(cli.verbose, &config.logging);

    let metrics_handle = if config.metrics.render_on_exit {
        Some(init_metrics()?)
    } else {
        None
    };

    info!(
        rules_file = ?config.rules_file,
        cache_capacity = config.engine.cache_capacity,
        "Starting docclass"
    );

    let service = commands::build_service(&config).await?;
    commands::run(&service, cli.command).await?;

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("docclass=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(logging.filter.as_deref().unwrap_or("docclass=info"))
        })
    };

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "docclass_classifications_total",
        "Documents classified, by whether any category matched"
    );
    metrics::describe_histogram!(
        "docclass_classification_latency_us",
        metrics::Unit::Microseconds,
        "Single-document classification latency in microseconds"
    );
    metrics::describe_counter!("docclass_errors_total", "Classification errors by kind");
    metrics::describe_counter!("docclass_batches_total", "Batches processed");
    metrics::describe_counter!(
        "docclass_batch_items_total",
        "Batch items processed, by outcome"
    );
    metrics::describe_counter!(
        "docclass_cache_lookups_total",
        "Result cache lookups, by hit or miss"
    );
    metrics::describe_counter!(
        "docclass_rule_mutations_total",
        "Rule mutations, by operation"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}

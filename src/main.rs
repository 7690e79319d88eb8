use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verity::api::{self, AppState};
use verity::config::Config;
use verity::factcheck::{FactChecker, Strategy};
use verity::kg::KnowledgeGraph;
use verity::producer::{ExtractionScope, TripleProducer};
use verity::storage::SqliteArticleStore;
use verity::updater::KnowledgeGraphUpdater;

#[derive(Parser)]
#[command(
    name = "verity",
    version,
    about = "Knowledge-based fake news detection over a knowledge graph",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (environment variables are used otherwise)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the fact-checker and updater HTTP API
    Serve {
        /// Listen address
        #[arg(short, long, default_value = "0.0.0.0:5000")]
        addr: String,
    },

    /// Extract canonicalized triples from text
    Extract {
        /// Input file ("-" reads stdin)
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Extraction scope (named_entities, noun_phrases, all)
        #[arg(short, long)]
        scope: Option<String>,
    },

    /// Fact check text against the knowledge graph
    Check {
        /// Input file ("-" reads stdin)
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Strategy (exact, better, non_exact)
        #[arg(long, default_value = "non_exact")]
        strategy: String,

        /// Extraction scope (named_entities, noun_phrases, all)
        #[arg(short, long)]
        scope: Option<String>,
    },

    /// Extract triples from stored articles that have none yet
    Update {
        /// Insert non-conflicting triples into the knowledge graph
        #[arg(long, default_value = "false")]
        auto: bool,

        /// Extraction scope (named_entities, noun_phrases, all)
        #[arg(short, long)]
        scope: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(std::path::Path::new(path))?,
        None => Config::from_env()?,
    };
    config.validate()?;

    if let Err(e) = verity::metrics::init_metrics() {
        tracing::warn!(error = %e, "metrics initialization failed, continuing without metrics");
    }

    let timeout = Duration::from_secs(config.services.request_timeout_secs);
    let kg = KnowledgeGraph::new(&config.knowledge_graph, timeout)?;

    match cli.command {
        Commands::Serve { addr } => {
            let exact = FactChecker::from_config(&config, kg.clone(), Strategy::Exact)?;
            let non_exact = FactChecker::from_config(&config, kg.clone(), Strategy::NonExact)?;
            let store = Arc::new(SqliteArticleStore::open(&config.storage.sqlite_path)?);
            let producer = TripleProducer::from_config(&config, kg.clone())?;
            let updater = Arc::new(KnowledgeGraphUpdater::new(
                store,
                kg,
                producer,
                config.pipeline.auto_update,
            ));
            let default_scope = ExtractionScope::from_str(&config.pipeline.extraction_scope)?;

            api::serve(
                AppState {
                    exact,
                    non_exact,
                    updater,
                    default_scope,
                },
                &addr,
            )
            .await?;
        }

        Commands::Extract { input, scope } => {
            let text = read_input(&input)?;
            let scope = resolve_scope(&config, scope)?;
            let producer = TripleProducer::from_config(&config, kg)?;
            let groups = producer.produce(&text, scope).await?;
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }

        Commands::Check {
            input,
            strategy,
            scope,
        } => {
            let text = read_input(&input)?;
            let scope = resolve_scope(&config, scope)?;
            let strategy = Strategy::from_str(&strategy)?;
            let checker = FactChecker::from_config(&config, kg, strategy)?;
            let report = checker.check_text(&text, scope).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Update { auto, scope } => {
            let scope = resolve_scope(&config, scope)?;
            let store = Arc::new(SqliteArticleStore::open(&config.storage.sqlite_path)?);
            let producer = TripleProducer::from_config(&config, kg.clone())?;
            let updater =
                KnowledgeGraphUpdater::new(store, kg, producer, config.pipeline.auto_update);
            let guard = updater
                .lock()
                .try_acquire()
                .context("an update is already running")?;
            let result = updater.update_missed_knowledge(Some(auto), scope).await;
            drop(guard);
            result?;
            tracing::info!("update finished");
        }
    }

    Ok(())
}

fn resolve_scope(config: &Config, scope: Option<String>) -> Result<ExtractionScope> {
    let name = scope.unwrap_or_else(|| config.pipeline.extraction_scope.clone());
    Ok(ExtractionScope::from_str(&name)?)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
    }
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("verity=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new("verity=info,warn")
        }
    });

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use newsink::config::{Backend, Config};
use newsink::export;
use newsink::extract;
use newsink::pipeline::FeedPipeline;
use newsink::storage::{DocumentStore, SqliteStore, Store};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "newsink", about = "Feed ingestion pipeline with watermark dedup")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest the configured feed once
    Run {
        /// Mark the audit record as user-triggered rather than scheduled
        #[arg(long)]
        by_user: bool,

        /// Use this partition for this invocation only
        #[arg(long)]
        partition: Option<String>,
    },
    /// Export stored items to a CSV file
    Export {
        /// Inclusive lower bound, "YYYY-MM-DD HH:MM:SS" (UTC)
        #[arg(long, value_name = "TIMESTAMP")]
        start: Option<String>,

        /// Inclusive upper bound, "YYYY-MM-DD HH:MM:SS" (UTC)
        #[arg(long, value_name = "TIMESTAMP")]
        end: Option<String>,

        /// Destination file; defaults to a timestamped name in the working directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Use this partition for this invocation only
        #[arg(long)]
        partition: Option<String>,
    },
    /// Create the named storage partition (idempotent)
    InitPartition { name: String },
}

fn parse_bound(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("invalid timestamp '{value}', expected YYYY-MM-DD HH:MM:SS"))?;
    Ok(naive.and_utc())
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.backend()? {
        Backend::Relational => {
            let store = SqliteStore::open(&config.relational_path()).await?;
            Ok(Arc::new(store))
        }
        Backend::Document => Ok(Arc::new(DocumentStore::new(config.document_root()))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Run { by_user, partition } => {
            let config = config.with_partition(partition);
            // Fail fast on an unresolvable extractor or backend name,
            // before any network or storage I/O.
            let extractor = extract::resolve(&config.extractor)?;
            let store = open_store(&config).await?;

            let mut pipeline = FeedPipeline::new(
                store,
                reqwest::Client::new(),
                config.feed_url.clone(),
                config.extractor.clone(),
                extractor,
            );
            let persisted = pipeline.run(by_user).await?;
            println!("run complete: {persisted} new items persisted");
        }
        Command::Export {
            start,
            end,
            output,
            partition,
        } => {
            let config = config.with_partition(partition);
            let from = start.as_deref().map(parse_bound).transpose()?;
            let to = end.as_deref().map(parse_bound).transpose()?;

            let store = open_store(&config).await?;
            // An export from a partition nothing ever wrote to yields a
            // header-only file on both backends.
            store.ensure_partition().await?;
            let path = export::export_csv(store.as_ref(), from, to, output.as_deref()).await?;
            println!("exported to {}", path.display());
        }
        Command::InitPartition { name } => {
            let config = config.with_partition(Some(name));
            let store = open_store(&config).await?;
            store.ensure_partition().await?;
            println!("partition '{}' ready", config.partition);
        }
    }

    Ok(())
}

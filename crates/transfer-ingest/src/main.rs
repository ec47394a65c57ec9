//! Transfer Ingest - scrape, deduplicate, and report league transfers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use transfer_common::logging::{init_logging, LogConfig, LogLevel};
use transfer_ingest::{
    config::IngestConfig,
    orchestrator::{IngestionBatch, IngestionOrchestrator, RunMode, StopReason},
    report::{format_report, split_report, DEFAULT_MESSAGE_LIMIT},
    store::{SqliteStore, TransferStore},
};

#[derive(Parser, Debug)]
#[command(name = "transfer-ingest")]
#[command(author, version, about = "League transfer ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Override TRANSFER_DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Maximum characters per printed message chunk
    #[arg(long, global = true, default_value_t = DEFAULT_MESSAGE_LIMIT)]
    message_limit: usize,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion pass and print the report
    Run {
        /// Collect without writing records
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run ingestion repeatedly on a fixed interval
    Watch {
        /// Seconds between runs
        #[arg(long, env = "TRANSFER_INTERVAL_SECS", default_value_t = 3600)]
        interval_secs: u64,

        /// Collect without writing records
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a report of the most recently stored transfers
    Report {
        /// Number of stored records to include
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("transfer-ingest")
        .build()
        .merge_env()?;
    init_logging(&log_config)?;

    let mut config = IngestConfig::from_env().context("Invalid ingestion configuration")?;
    if let Some(url) = cli.database_url.clone() {
        config.database_url = url;
    }

    let store = SqliteStore::connect(&config.database_url, &config.table).await?;

    match cli.command {
        Command::Run { dry_run, format } => {
            let orchestrator = IngestionOrchestrator::from_config(&config)?;
            let batch = orchestrator
                .run_ingestion(&config.sources, &store, run_mode(dry_run))
                .await?;
            match format {
                OutputFormat::Text => print_report(&batch, cli.message_limit),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&batch)?),
            }
        },
        Command::Watch {
            interval_secs,
            dry_run,
        } => {
            let orchestrator = IngestionOrchestrator::from_config(&config)?;
            watch(&orchestrator, &config, &store, interval_secs, run_mode(dry_run), cli.message_limit)
                .await?;
        },
        Command::Report { limit } => {
            if !store.exists().await? {
                info!(table = %config.table, "No transfers stored yet");
                return Ok(());
            }
            let records = store.load_all().await?;
            let recent = &records[records.len().saturating_sub(limit)..];
            match format_report(recent) {
                Some(text) => print_chunks(&text, cli.message_limit),
                None => info!("No reportable transfers stored"),
            }
        },
    }

    Ok(())
}

fn run_mode(dry_run: bool) -> RunMode {
    if dry_run {
        RunMode::DryRun
    } else {
        RunMode::Persist
    }
}

/// Runs never overlap: the next tick is awaited only after a run finishes.
async fn watch(
    orchestrator: &IngestionOrchestrator,
    config: &IngestConfig,
    store: &dyn TransferStore,
    interval_secs: u64,
    mode: RunMode,
    message_limit: usize,
) -> Result<()> {
    if interval_secs == 0 {
        anyhow::bail!("interval must be greater than 0");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs, "Watching transfer listings");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match orchestrator.run_ingestion(&config.sources, store, mode).await {
                    Ok(batch) => print_report(&batch, message_limit),
                    Err(e) => error!(error = %e, "Ingestion run failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

fn print_report(batch: &IngestionBatch, message_limit: usize) {
    for outcome in batch.failed_sources() {
        if let StopReason::Failed(message) = &outcome.stop {
            warn!(
                source = %outcome.source_id,
                pages_fetched = outcome.pages_fetched,
                kept = outcome.new_rows,
                error = %message,
                "Source failed during run"
            );
        }
    }

    match format_report(&batch.records) {
        Some(text) => print_chunks(&text, message_limit),
        None => info!(
            new_rows = batch.len(),
            failed_sources = batch.failed_sources().count(),
            "Nothing to report"
        ),
    }
}

fn print_chunks(text: &str, message_limit: usize) {
    for chunk in split_report(text, message_limit) {
        println!("{}\n", chunk);
    }
}

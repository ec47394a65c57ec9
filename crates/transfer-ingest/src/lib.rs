//! Transfer Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental ingestion of league transfer listings.
//!
//! Each run walks the configured sources newest-first, stops a source as soon
//! as it reaches records that are already stored, and appends only the new
//! rows. The resulting batch can be rendered as a chat report.
//!
//! # Example
//!
//! ```no_run
//! use transfer_ingest::{
//!     config::IngestConfig,
//!     orchestrator::{IngestionOrchestrator, RunMode},
//!     report::format_report,
//!     store::SqliteStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let store = SqliteStore::connect(&config.database_url, &config.table).await?;
//!     let orchestrator = IngestionOrchestrator::from_config(&config)?;
//!
//!     let batch = orchestrator
//!         .run_ingestion(&config.sources, &store, RunMode::Persist)
//!         .await?;
//!     if let Some(report) = format_report(&batch.records) {
//!         println!("{}", report);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod schema;
pub mod store;

pub use error::{IngestError, Result};
pub use orchestrator::{IngestionBatch, IngestionOrchestrator, RunMode};

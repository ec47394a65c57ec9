//! Ingestion orchestrator
//!
//! Walks every configured source page by page, keeps only rows whose identity
//! is not yet stored, and persists the merged batch once at the end of the run.
//!
//! Per source the loop is a small state machine:
//!
//! ```text
//! Fetching(1) -> fetch -> parse -> dedup check -> Fetching(page + 1)
//!                                              \-> Stopped(reason)
//! ```
//!
//! A source stops when a page overlaps stored history, when the last page is
//! reached, when a page is empty or the page limit is hit, or when fetching or
//! parsing fails. A failed source keeps what it collected and never blocks the
//! others. Store failures abort the whole run, and so does a run in which
//! every source failed without collecting a row.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error, info, instrument};
use transfer_common::{Source, TransferRecord};

use crate::config::IngestConfig;
use crate::dedup::{filter_new, known_ids, overlap_exists};
use crate::error::{IngestError, Result};
use crate::fetcher::PageFetcher;
use crate::parser::TableParser;
use crate::schema::TableSchema;
use crate::store::{SaveMode, TransferStore};

/// Whether a run writes its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Collect and return the batch without writing records
    DryRun,
    /// Append the batch to the store
    Persist,
}

/// Why a source stopped paginating
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum StopReason {
    /// A page contained already-stored records
    Overlap,
    /// The last advertised page was processed
    LastPage,
    /// A page had no rows
    EmptyPage,
    /// The per-run page limit was reached
    PageLimit,
    /// Fetching or parsing failed; earlier pages were kept
    Failed(String),
}

/// Per-source summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOutcome {
    pub source_id: String,
    pub pages_fetched: u32,
    pub new_rows: usize,
    pub stop: StopReason,
}

impl SourceOutcome {
    pub fn failed(&self) -> bool {
        matches!(self.stop, StopReason::Failed(_))
    }
}

/// New records of one run across all sources
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionBatch {
    /// Records in source order, then page order
    pub records: Vec<TransferRecord>,
    pub outcomes: Vec<SourceOutcome>,
}

impl IngestionBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Outcomes of sources that stopped on a failure
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| o.failed())
    }
}

enum SourceState {
    Fetching(u32),
    Stopped(StopReason),
}

/// Drives ingestion runs
pub struct IngestionOrchestrator {
    fetcher: PageFetcher,
    parser: TableParser,
    max_pages: u32,
}

impl IngestionOrchestrator {
    pub fn new(fetcher: PageFetcher, parser: TableParser, max_pages: u32) -> Self {
        Self {
            fetcher,
            parser,
            max_pages,
        }
    }

    /// Build an orchestrator for the listing layout from configuration
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let fetcher = PageFetcher::new(config.base_url.clone(), config.fetch.clone())?;
        let parser = TableParser::new(TableSchema::league_transfers())?;
        Ok(Self::new(fetcher, parser, config.max_pages))
    }

    /// Run one ingestion pass over `sources`
    ///
    /// Returns the new records; in [`RunMode::Persist`] a non-empty batch is
    /// appended to the store in a single call before returning. Fails with
    /// [`IngestError::AllSourcesFailed`] when every source failed before
    /// collecting anything.
    #[instrument(skip_all, fields(sources = sources.len(), mode = ?mode))]
    pub async fn run_ingestion(
        &self,
        sources: &[Source],
        store: &dyn TransferStore,
        mode: RunMode,
    ) -> Result<IngestionBatch> {
        store.ensure_exists().await?;
        let known = known_ids(store).await?;
        info!(known = known.len(), "Starting ingestion run");

        let mut batch = IngestionBatch::default();
        let mut seen = HashSet::new();

        for source in sources {
            let (records, outcome) = self.ingest_source(source, &known, &mut seen).await;
            batch.records.extend(records);
            batch.outcomes.push(outcome);
        }

        let failed = batch.failed_sources().count();
        if failed > 0 && failed == batch.outcomes.len() && batch.is_empty() {
            error!(sources = failed, "Every source failed");
            return Err(IngestError::AllSourcesFailed { sources: failed });
        }

        match mode {
            RunMode::Persist if batch.is_empty() => {
                debug!("Nothing new, skipping save");
            },
            RunMode::Persist => {
                store.save(&batch.records, SaveMode::Append).await?;
            },
            RunMode::DryRun => {
                debug!(rows = batch.len(), "Dry run, batch not persisted");
            },
        }

        info!(
            new_rows = batch.len(),
            failed_sources = failed,
            "Ingestion run completed"
        );
        Ok(batch)
    }

    #[instrument(skip_all, fields(source = %source.id))]
    async fn ingest_source(
        &self,
        source: &Source,
        known: &HashSet<String>,
        seen: &mut HashSet<String>,
    ) -> (Vec<TransferRecord>, SourceOutcome) {
        let mut collected = Vec::new();
        let mut pages_fetched = 0;
        let mut state = SourceState::Fetching(1);

        let stop = loop {
            match state {
                SourceState::Fetching(page) => {
                    state = self
                        .step(source, page, known, seen, &mut collected, &mut pages_fetched)
                        .await;
                },
                SourceState::Stopped(reason) => break reason,
            }
        };

        match &stop {
            StopReason::Failed(message) => error!(
                pages_fetched,
                kept = collected.len(),
                error = %message,
                "Source stopped on failure"
            ),
            reason => info!(pages_fetched, new_rows = collected.len(), ?reason, "Source done"),
        }

        let outcome = SourceOutcome {
            source_id: source.id.clone(),
            pages_fetched,
            new_rows: collected.len(),
            stop,
        };
        (collected, outcome)
    }

    /// Process one page and decide the next state
    async fn step(
        &self,
        source: &Source,
        page: u32,
        known: &HashSet<String>,
        seen: &mut HashSet<String>,
        collected: &mut Vec<TransferRecord>,
        pages_fetched: &mut u32,
    ) -> SourceState {
        let html = match self.fetcher.fetch_page(source, page).await {
            Ok(html) => html,
            Err(e) => return SourceState::Stopped(StopReason::Failed(e.to_string())),
        };
        *pages_fetched += 1;

        let parsed = match self
            .fetcher
            .page_url(source, page)
            .and_then(|url| self.parser.parse(&html, &url, page))
        {
            Ok(parsed) => parsed,
            Err(e) => return SourceState::Stopped(StopReason::Failed(e.to_string())),
        };

        let records = match self.parser.to_records(&parsed, &source.name) {
            Ok(records) => records,
            Err(e) => return SourceState::Stopped(StopReason::Failed(e.to_string())),
        };

        if records.is_empty() {
            return SourceState::Stopped(StopReason::EmptyPage);
        }

        let overlap = overlap_exists(&records, known);
        let fresh: Vec<_> = filter_new(&records, known)
            .into_iter()
            .filter(|r| seen.insert(r.id().to_string()))
            .collect();

        debug!(
            page,
            last_page = parsed.last_page,
            rows = records.len(),
            new_rows = fresh.len(),
            overlap,
            "Processed page"
        );
        collected.extend(fresh);

        if overlap {
            SourceState::Stopped(StopReason::Overlap)
        } else if page >= parsed.last_page {
            SourceState::Stopped(StopReason::LastPage)
        } else if page >= self.max_pages {
            SourceState::Stopped(StopReason::PageLimit)
        } else {
            SourceState::Fetching(page + 1)
        }
    }
}

//! Error taxonomy for the ingestion pipeline
//!
//! `Fetch` and `Parse` degrade a single source; the `Store*` variants abort
//! the whole run. `AllSourcesFailed` separates a run where nothing could be
//! read from a run that found nothing new.

use thiserror::Error;
use transfer_common::TransferError;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Fetch failed for {url} after {attempts} attempt(s): {message}")]
    Fetch {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Could not create store destination: {0}")]
    StoreCreate(String),

    #[error("Could not read stored identities: {0}")]
    StoreRead(String),

    #[error("Could not write batch: {0}")]
    StoreWrite(String),

    #[error("All {sources} source(s) failed, nothing was collected")]
    AllSourcesFailed { sources: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Domain(#[from] TransferError),
}

impl IngestError {
    /// Whether the error stops the whole run rather than a single source
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::StoreCreate(_)
                | IngestError::StoreRead(_)
                | IngestError::StoreWrite(_)
                | IngestError::AllSourcesFailed { .. }
                | IngestError::Config(_)
        )
    }
}

impl From<url::ParseError> for IngestError {
    fn from(err: url::ParseError) -> Self {
        IngestError::Config(err.to_string())
    }
}

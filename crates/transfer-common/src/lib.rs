//! Transfer Watch Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, identity hashing, logging, and error handling for the
//! transfer ingestion workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Shared error type and result alias
//! - **Identity**: Content-hash identities for transfer rows
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//! - **Types**: `TransferRecord` and `Source`
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use transfer_common::types::TransferRecord;
//!
//! fn main() -> transfer_common::Result<()> {
//!     let date = NaiveDate::from_ymd_opt(2024, 7, 1)
//!         .and_then(|d| d.and_hms_opt(18, 30, 0))
//!         .ok_or_else(|| transfer_common::TransferError::InvalidRecord("bad date".into()))?;
//!     let record = TransferRecord::new(
//!         "Super League",
//!         "Jane Doe",
//!         "https://example.com/players/7",
//!         date,
//!         "Red Lions",
//!         "Classic Contract",
//!     )?;
//!     println!("{}", record.id());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod identity;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TransferError};
pub use types::{Source, TransferRecord};

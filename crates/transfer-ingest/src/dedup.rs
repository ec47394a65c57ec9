//! Deduplication against stored identities
//!
//! Applied page by page: the listing is newest-first, so the first page that
//! contains a known identity marks the start of already-ingested history.

use std::collections::HashSet;
use transfer_common::TransferRecord;

use crate::error::Result;
use crate::store::TransferStore;

/// Identities of every record already in the store
pub async fn known_ids(store: &dyn TransferStore) -> Result<HashSet<String>> {
    store.known_ids().await
}

/// True if any record of `batch` is already known
pub fn overlap_exists(batch: &[TransferRecord], known: &HashSet<String>) -> bool {
    batch.iter().any(|record| known.contains(record.id()))
}

/// Records of `batch` that are not known, in their original order
pub fn filter_new(batch: &[TransferRecord], known: &HashSet<String>) -> Vec<TransferRecord> {
    batch
        .iter()
        .filter(|record| !known.contains(record.id()))
        .cloned()
        .collect()
}

//! Durable storage for transfer records
//!
//! The store is append-only and keyed logically by the record's content hash.
//! It does not enforce uniqueness itself: the deduplicator filters rows before
//! they are written.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use transfer_common::types::DATE_STORAGE_FORMAT;
use transfer_common::TransferRecord;

use crate::config::is_identifier;
use crate::error::{IngestError, Result};

/// Rows per INSERT statement (7 bound parameters each)
const INSERT_CHUNK_SIZE: usize = 100;

/// How `save` treats rows already in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Add rows after the existing ones (normal ingestion)
    Append,
    /// Remove every stored row first (full rebuild)
    Replace,
}

/// Storage backend for transfer records
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Create the destination if it does not exist yet
    async fn ensure_exists(&self) -> Result<()>;

    /// Whether the destination has been created; never creates it
    async fn exists(&self) -> Result<bool>;

    /// Identities of every stored record
    async fn known_ids(&self) -> Result<HashSet<String>>;

    /// Write rows atomically, returning how many were written
    async fn save(&self, rows: &[TransferRecord], mode: SaveMode) -> Result<usize>;

    /// Every stored record in insertion order
    async fn load_all(&self) -> Result<Vec<TransferRecord>>;
}

// ============================================================================
// SQLite
// ============================================================================

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteStore {
    /// Open (creating the database file if needed) a store at `database_url`
    pub async fn connect(database_url: &str, table: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| IngestError::StoreCreate(format!("invalid database URL: {}", e)))?
            .create_if_missing(true);

        // One long-lived connection: runs are sequential, and an in-memory
        // database only lives as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| IngestError::StoreCreate(format!("failed to open database: {}", e)))?;

        Self::from_pool(pool, table)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool, table: &str) -> Result<Self> {
        if !is_identifier(table) {
            return Err(IngestError::Config(format!("invalid table name '{}'", table)));
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl TransferStore for SqliteStore {
    async fn ensure_exists(&self) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE {} (
                id TEXT NOT NULL,
                league TEXT NOT NULL,
                player TEXT NOT NULL,
                player_link TEXT NOT NULL,
                date TEXT NOT NULL,
                club TEXT NOT NULL,
                contract_type TEXT NOT NULL
            )
            "#,
            self.table
        );

        match sqlx::query(&ddl).execute(&self.pool).await {
            Ok(_) => {
                info!(table = %self.table, "Created transfer table");
                Ok(())
            },
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("already exists") => {
                debug!(table = %self.table, "Transfer table already exists");
                Ok(())
            },
            Err(e) => Err(IngestError::StoreCreate(e.to_string())),
        }
    }

    async fn exists(&self) -> Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&self.table)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IngestError::StoreRead(e.to_string()))?;
        Ok(found.is_some())
    }

    async fn known_ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(&format!("SELECT id FROM {}", self.table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IngestError::StoreRead(e.to_string()))?;

        debug!(table = %self.table, count = ids.len(), "Loaded known identities");
        Ok(ids.into_iter().collect())
    }

    async fn save(&self, rows: &[TransferRecord], mode: SaveMode) -> Result<usize> {
        let write_err = |e: sqlx::Error| IngestError::StoreWrite(e.to_string());

        let mut tx = self.pool.begin().await.map_err(write_err)?;

        if mode == SaveMode::Replace {
            sqlx::query(&format!("DELETE FROM {}", self.table))
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
        }

        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO {} (id, league, player, player_link, date, club, contract_type) ",
                self.table
            ));
            builder.push_values(chunk, |mut b, record| {
                b.push_bind(record.id().to_string())
                    .push_bind(record.league().to_string())
                    .push_bind(record.player().to_string())
                    .push_bind(record.player_link().to_string())
                    .push_bind(record.date_string())
                    .push_bind(record.club().to_string())
                    .push_bind(record.contract_type().to_string());
            });
            builder.build().execute(&mut *tx).await.map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;

        info!(table = %self.table, rows = rows.len(), ?mode, "Saved transfer records");
        Ok(rows.len())
    }

    async fn load_all(&self) -> Result<Vec<TransferRecord>> {
        let read_err = |e: String| IngestError::StoreRead(e);

        let rows = sqlx::query(&format!(
            "SELECT id, league, player, player_link, date, club, contract_type FROM {} ORDER BY rowid",
            self.table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_err(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let get = |column: &str| -> Result<String> {
                row.try_get::<String, _>(column).map_err(|e| read_err(e.to_string()))
            };

            let date = NaiveDateTime::parse_from_str(&get("date")?, DATE_STORAGE_FORMAT)
                .map_err(|e| read_err(format!("stored date is invalid: {}", e)))?;

            let record = TransferRecord::new(
                get("league")?,
                get("player")?,
                get("player_link")?,
                date,
                get("club")?,
                get("contract_type")?,
            )
            .map_err(|e| read_err(e.to_string()))?;

            let stored_id = get("id")?;
            if record.id() != stored_id {
                warn!(stored = %stored_id, computed = %record.id(), "Stored identity does not match row content");
            }
            records.push(record);
        }

        Ok(records)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store for tests and throwaway runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// `None` until `ensure_exists` has been called
    rows: Mutex<Option<Vec<TransferRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already exists and holds `records`
    pub fn with_records(records: Vec<TransferRecord>) -> Self {
        Self {
            rows: Mutex::new(Some(records)),
        }
    }

    fn with_rows<T>(
        &self,
        on_error: fn(String) -> IngestError,
        f: impl FnOnce(&mut Vec<TransferRecord>) -> T,
    ) -> Result<T> {
        let mut guard = self.rows.lock().map_err(|e| on_error(e.to_string()))?;
        let rows = guard
            .as_mut()
            .ok_or_else(|| on_error("store has not been created".to_string()))?;
        Ok(f(rows))
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn ensure_exists(&self) -> Result<()> {
        let mut guard = self
            .rows
            .lock()
            .map_err(|e| IngestError::StoreCreate(e.to_string()))?;
        guard.get_or_insert_with(Vec::new);
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        let guard = self
            .rows
            .lock()
            .map_err(|e| IngestError::StoreRead(e.to_string()))?;
        Ok(guard.is_some())
    }

    async fn known_ids(&self) -> Result<HashSet<String>> {
        self.with_rows(IngestError::StoreRead, |rows| {
            rows.iter().map(|r| r.id().to_string()).collect()
        })
    }

    async fn save(&self, rows: &[TransferRecord], mode: SaveMode) -> Result<usize> {
        self.with_rows(IngestError::StoreWrite, |stored| {
            if mode == SaveMode::Replace {
                stored.clear();
            }
            stored.extend_from_slice(rows);
            rows.len()
        })
    }

    async fn load_all(&self) -> Result<Vec<TransferRecord>> {
        self.with_rows(IngestError::StoreRead, |rows| rows.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(player: &str) -> TransferRecord {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        TransferRecord::new(
            "Super League",
            player,
            format!("https://example.com/players/{}", player),
            date,
            "Red Lions",
            "Classic Contract",
        )
        .unwrap()
    }

    async fn memory_sqlite() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", "transfers").await.unwrap()
    }

    #[tokio::test]
    async fn test_ensure_exists_is_idempotent() {
        let store = memory_sqlite().await;
        store.ensure_exists().await.unwrap();
        store.ensure_exists().await.unwrap();
        assert!(store.known_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_known_ids_before_creation_is_read_error() {
        let store = memory_sqlite().await;
        let err = store.known_ids().await.unwrap_err();
        assert!(matches!(err, IngestError::StoreRead(_)));
    }

    #[tokio::test]
    async fn test_exists_does_not_create_table() {
        let store = memory_sqlite().await;
        assert!(!store.exists().await.unwrap());
        assert!(!store.exists().await.unwrap());
        assert!(store.load_all().await.is_err());

        store.ensure_exists().await.unwrap();
        assert!(store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_append_and_load_round_trip() {
        let store = memory_sqlite().await;
        store.ensure_exists().await.unwrap();

        let rows = vec![record("alice"), record("bob")];
        assert_eq!(store.save(&rows, SaveMode::Append).await.unwrap(), 2);
        store.save(&[record("carol")], SaveMode::Append).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], rows[0]);
        assert_eq!(loaded[2].player(), "carol");

        let ids = store.known_ids().await.unwrap();
        assert!(ids.contains(rows[1].id()));
    }

    #[tokio::test]
    async fn test_replace_discards_previous_rows() {
        let store = memory_sqlite().await;
        store.ensure_exists().await.unwrap();
        store.save(&[record("alice"), record("bob")], SaveMode::Append).await.unwrap();
        store.save(&[record("carol")], SaveMode::Replace).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].player(), "carol");
    }

    #[tokio::test]
    async fn test_storage_does_not_enforce_uniqueness() {
        let store = memory_sqlite().await;
        store.ensure_exists().await.unwrap();
        store.save(&[record("alice")], SaveMode::Append).await.unwrap();
        store.save(&[record("alice")], SaveMode::Append).await.unwrap();

        assert_eq!(store.load_all().await.unwrap().len(), 2);
        assert_eq!(store.known_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_large_batch_is_chunked() {
        let store = memory_sqlite().await;
        store.ensure_exists().await.unwrap();
        let rows: Vec<_> = (0..250).map(|i| record(&format!("p{}", i))).collect();
        store.save(&rows, SaveMode::Append).await.unwrap();
        assert_eq!(store.known_ids().await.unwrap().len(), 250);
    }

    #[tokio::test]
    async fn test_file_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("transfers.db").display());

        {
            let store = SqliteStore::connect(&url, "transfers").await.unwrap();
            store.ensure_exists().await.unwrap();
            store.save(&[record("alice")], SaveMode::Append).await.unwrap();
        }

        let reopened = SqliteStore::connect(&url, "transfers").await.unwrap();
        reopened.ensure_exists().await.unwrap();
        assert_eq!(reopened.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_table_name_rejected() {
        let pool = SqlitePoolOptions::new().connect_lazy("sqlite::memory:").unwrap();
        assert!(SqliteStore::from_pool(pool, "x; DROP TABLE y").is_err());
    }

    #[tokio::test]
    async fn test_memory_store_requires_creation() {
        let store = MemoryStore::new();
        assert!(matches!(store.known_ids().await, Err(IngestError::StoreRead(_))));
        assert!(!store.exists().await.unwrap());
        store.ensure_exists().await.unwrap();
        assert!(store.exists().await.unwrap());
        store.save(&[record("alice")], SaveMode::Append).await.unwrap();
        assert_eq!(store.known_ids().await.unwrap().len(), 1);
    }
}

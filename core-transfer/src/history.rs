//! # Transfer History
//!
//! Remembers, per source collection, where it was last transferred and what
//! its content looked like at the time.
//!
//! ## Overview
//!
//! - [`TransferRecord`]: one row per source collection, replaced on every
//!   completed transfer
//! - [`TransferHistoryRepository`]: durable storage contract
//! - [`SqliteTransferHistoryRepository`]: SQLite implementation via `sqlx`
//! - [`TransferHistory`]: the process-wide store the engine reads and writes;
//!   loaded once, then served from memory with write-through persistence

use crate::{Result, TransferError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_runtime::config::TransferConfig;
use core_runtime::events::{CoreEvent, EventBus, HistoryEvent};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

// ============================================================================
// Record
// ============================================================================

/// Outcome of the last completed transfer of one source collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub source_collection_id: String,
    pub target_collection_id: String,
    /// Fingerprint of the source snapshot the transfer was decided on
    pub fingerprint: String,
    /// Source item count at that time
    pub item_count: u64,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
}

impl TransferRecord {
    pub fn transferred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Durable storage for transfer records.
#[async_trait]
pub trait TransferHistoryRepository: Send + Sync {
    /// Find the record for a source collection
    async fn find(&self, source_collection_id: &str) -> Result<Option<TransferRecord>>;

    /// Insert or replace the record keyed by `record.source_collection_id`
    async fn upsert(&self, record: &TransferRecord) -> Result<()>;

    /// Remove a record; returns whether one existed
    async fn delete(&self, source_collection_id: &str) -> Result<bool>;

    /// All stored records, most recent first
    async fn list_all(&self) -> Result<Vec<TransferRecord>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS transfer_history (
        source_collection_id TEXT PRIMARY KEY NOT NULL,
        target_collection_id TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        item_count INTEGER NOT NULL,
        timestamp INTEGER NOT NULL
    )
"#;

/// SQLite-backed [`TransferHistoryRepository`].
#[derive(Clone)]
pub struct SqliteTransferHistoryRepository {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct TransferRecordRow {
    source_collection_id: String,
    target_collection_id: String,
    fingerprint: String,
    item_count: i64,
    timestamp: i64,
}

impl From<TransferRecordRow> for TransferRecord {
    fn from(row: TransferRecordRow) -> Self {
        Self {
            source_collection_id: row.source_collection_id,
            target_collection_id: row.target_collection_id,
            fingerprint: row.fingerprint,
            item_count: u64::try_from(row.item_count).unwrap_or(0),
            timestamp: row.timestamp,
        }
    }
}

impl SqliteTransferHistoryRepository {
    /// Wrap an existing pool, creating the table if needed.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Open (or create) a history database file.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TransferError::History(format!(
                    "Failed to create history directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Opened transfer history database");
        Self::new(pool).await
    }

    /// Private in-memory database, for tests and ephemeral sessions.
    ///
    /// The database lives only as long as its connection, so the pool never
    /// reaps it.
    pub async fn in_memory() -> Result<Self> {
        let pool = in_memory_pool_options()
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool).await
    }
}

fn in_memory_pool_options() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

#[async_trait]
impl TransferHistoryRepository for SqliteTransferHistoryRepository {
    async fn find(&self, source_collection_id: &str) -> Result<Option<TransferRecord>> {
        let row = sqlx::query_as::<_, TransferRecordRow>(
            r#"
            SELECT source_collection_id, target_collection_id, fingerprint, item_count, timestamp
            FROM transfer_history
            WHERE source_collection_id = ?
            "#,
        )
        .bind(source_collection_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TransferRecord::from))
    }

    async fn upsert(&self, record: &TransferRecord) -> Result<()> {
        let item_count = i64::try_from(record.item_count).map_err(|_| {
            TransferError::History(format!("Item count {} out of range", record.item_count))
        })?;

        sqlx::query(
            r#"
            INSERT INTO transfer_history (
                source_collection_id, target_collection_id, fingerprint, item_count, timestamp
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(source_collection_id) DO UPDATE SET
                target_collection_id = excluded.target_collection_id,
                fingerprint = excluded.fingerprint,
                item_count = excluded.item_count,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&record.source_collection_id)
        .bind(&record.target_collection_id)
        .bind(&record.fingerprint)
        .bind(item_count)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, source_collection_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transfer_history WHERE source_collection_id = ?")
            .bind(source_collection_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query_as::<_, TransferRecordRow>(
            r#"
            SELECT source_collection_id, target_collection_id, fingerprint, item_count, timestamp
            FROM transfer_history
            ORDER BY timestamp DESC, source_collection_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TransferRecord::from).collect())
    }
}

// ============================================================================
// Process-wide Store
// ============================================================================

/// In-memory view of the history, persisted on every write.
///
/// Reads never touch the repository after [`TransferHistory::load`]. A write
/// is visible to `get` as soon as `put`/`clear` returns.
pub struct TransferHistory {
    records: RwLock<HashMap<String, TransferRecord>>,
    repository: Arc<dyn TransferHistoryRepository>,
    event_bus: Option<Arc<EventBus>>,
}

impl TransferHistory {
    /// Load every stored record into memory.
    #[instrument(skip(repository))]
    pub async fn load(repository: Arc<dyn TransferHistoryRepository>) -> Result<Self> {
        let records: HashMap<String, TransferRecord> = repository
            .list_all()
            .await?
            .into_iter()
            .map(|record| (record.source_collection_id.clone(), record))
            .collect();

        info!(records = records.len(), "Loaded transfer history");

        Ok(Self {
            records: RwLock::new(records),
            repository,
            event_bus: None,
        })
    }

    /// Empty history kept in a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let repository = SqliteTransferHistoryRepository::in_memory().await?;
        Self::load(Arc::new(repository)).await
    }

    /// Open the store configured by `history_database_path`, falling back
    /// to memory when unset.
    pub async fn open(config: &TransferConfig) -> Result<Self> {
        match &config.history_database_path {
            Some(path) => {
                let repository = SqliteTransferHistoryRepository::connect(path).await?;
                Self::load(Arc::new(repository)).await
            }
            None => Self::in_memory().await,
        }
    }

    /// Publish `HistoryEvent`s on writes.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn get(&self, source_collection_id: &str) -> Option<TransferRecord> {
        self.records.read().await.get(source_collection_id).cloned()
    }

    /// Replace the record for `record.source_collection_id`.
    pub async fn put(&self, record: TransferRecord) -> Result<()> {
        self.repository.upsert(&record).await?;

        debug!(
            source_collection_id = %record.source_collection_id,
            fingerprint = %record.fingerprint,
            "Stored transfer record"
        );

        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::History(HistoryEvent::RecordStored {
                source_collection_id: record.source_collection_id.clone(),
                target_collection_id: record.target_collection_id.clone(),
                item_count: record.item_count,
            }))
            .ok();
        }

        self.records
            .write()
            .await
            .insert(record.source_collection_id.clone(), record);
        Ok(())
    }

    /// Forget a collection; returns whether a record existed.
    pub async fn clear(&self, source_collection_id: &str) -> Result<bool> {
        self.repository.delete(source_collection_id).await?;
        let existed = self
            .records
            .write()
            .await
            .remove(source_collection_id)
            .is_some();

        if existed {
            if let Some(bus) = &self.event_bus {
                bus.emit(CoreEvent::History(HistoryEvent::RecordCleared {
                    source_collection_id: source_collection_id.to_string(),
                }))
                .ok();
            }
        }
        Ok(existed)
    }

    /// Snapshot of all records, most recent first.
    pub async fn records(&self) -> Vec<TransferRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.source_collection_id.cmp(&b.source_collection_id))
        });
        records
    }
}

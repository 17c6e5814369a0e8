//! SQLite implementation of UploadLedger
//!
//! One table, `uploadedtime`, keyed by absolute path. Timestamps are stored
//! as RFC 3339 strings in UTC with nanosecond precision so that a stamp
//! taken in the same second as a file modification still orders correctly.
//!
//! | Domain Type     | SQL Type | Strategy                                   |
//! |-----------------|----------|--------------------------------------------|
//! | PathBuf         | TEXT     | `to_string_lossy()` / `PathBuf::from`      |
//! | DateTime<Utc>   | TEXT     | `to_rfc3339_opts(Nanos)` / `parse_from_rfc3339` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info, warn};

use fwatch_core::domain::LedgerEntry;
use fwatch_core::ports::UploadLedger;

use crate::LedgerError;

/// SQLite only admits one writer; the second connection lets the catch-up
/// pass read while an upload task holds the write lock.
const MAX_CONNECTIONS: u32 = 2;

/// Upload tasks stamp concurrently and queue on the write lock for this long.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = include_str!("migrations/20260301_uploadedtime.sql");

/// SQLite-based implementation of the upload ledger port
///
/// All operations go through the pool, so the ledger can be shared between
/// every upload task, the catch-up pass and the CLI without external locking.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Opens (creating if needed) the ledger database at `path`
    ///
    /// Missing parent directories are created and the journal is switched
    /// to WAL so listings never block upload stamps.
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::ConnectionFailed(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                LedgerError::ConnectionFailed(format!("{}: {}", path.display(), e))
            })?;

        let ledger = Self::with_schema(pool).await?;
        info!(path = %path.display(), "Upload ledger opened");
        Ok(ledger)
    }

    /// Opens a private in-memory ledger
    ///
    /// An in-memory SQLite database lives in its connection, so the pool is
    /// pinned to one.
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LedgerError::ConnectionFailed(format!("in-memory ledger: {}", e)))?;

        Self::with_schema(pool).await
    }

    async fn with_schema(pool: SqlitePool) -> Result<Self, LedgerError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| LedgerError::MigrationFailed(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Stamps one path inside `tx`, never moving its time backwards
    ///
    /// The insert runs first so the transaction already holds the write lock
    /// when the stored stamp is read. An unreadable stored stamp is replaced.
    async fn stamp(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        at: DateTime<Utc>,
        stamp: &str,
    ) -> Result<(), LedgerError> {
        let inserted = sqlx::query(
            "INSERT INTO uploadedtime (path, uploaded_at) VALUES (?, ?)
             ON CONFLICT(path) DO NOTHING",
        )
        .bind(key)
        .bind(stamp)
        .execute(&mut **tx)
        .await?;
        if inserted.rows_affected() == 1 {
            return Ok(());
        }

        let stored: String = sqlx::query("SELECT uploaded_at FROM uploadedtime WHERE path = ?")
            .bind(key)
            .fetch_one(&mut **tx)
            .await?
            .get("uploaded_at");
        if let Some(existing) = parse_timestamp(&stored) {
            if existing > at {
                debug!(path = %key, stored = %stored, "Keeping later upload time");
                return Ok(());
            }
        }

        sqlx::query("UPDATE uploadedtime SET uploaded_at = ? WHERE path = ?")
            .bind(stamp)
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses a stored timestamp; unreadable values yield `None`
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

// ============================================================================
// UploadLedger implementation
// ============================================================================

#[async_trait::async_trait]
impl UploadLedger for SqliteLedger {
    async fn last_upload(&self, path: &Path) -> anyhow::Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT uploaded_at FROM uploadedtime WHERE path = ?")
            .bind(path_key(path))
            .fetch_optional(&self.pool)
            .await
            .map_err(LedgerError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get("uploaded_at");
        let parsed = parse_timestamp(&raw);
        if parsed.is_none() {
            debug!(path = %path.display(), value = %raw, "Unreadable ledger timestamp, treating as absent");
        }
        Ok(parsed)
    }

    async fn record(&self, at: DateTime<Utc>, paths: &[PathBuf]) -> anyhow::Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let stamp = format_timestamp(at);
        let mut tx = self.pool.begin().await.map_err(LedgerError::from)?;

        for path in paths {
            Self::stamp(&mut tx, &path_key(path), at, &stamp).await?;
        }

        tx.commit().await.map_err(LedgerError::from)?;

        debug!(count = paths.len(), at = %stamp, "Recorded uploads");
        Ok(())
    }

    async fn delete(&self, paths: &[PathBuf]) -> anyhow::Result<u64> {
        if paths.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(LedgerError::from)?;
        let mut removed = 0;

        for path in paths {
            let result = sqlx::query("DELETE FROM uploadedtime WHERE path = ?")
                .bind(path_key(path))
                .execute(&mut *tx)
                .await
                .map_err(LedgerError::from)?;
            removed += result.rows_affected();
        }

        tx.commit().await.map_err(LedgerError::from)?;

        debug!(requested = paths.len(), removed, "Deleted upload records");
        Ok(removed)
    }

    async fn entries(&self) -> anyhow::Result<Vec<LedgerEntry>> {
        let rows = sqlx::query("SELECT path, uploaded_at FROM uploadedtime ORDER BY path")
            .fetch_all(&self.pool)
            .await
            .map_err(LedgerError::from)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let path: String = row.get("path");
            let raw: String = row.get("uploaded_at");
            match parse_timestamp(&raw) {
                Some(uploaded_at) => entries.push(LedgerEntry {
                    path: PathBuf::from(path),
                    uploaded_at,
                }),
                None => warn!(path = %path, value = %raw, "Skipping unreadable ledger entry"),
            }
        }

        Ok(entries)
    }

    async fn close(&self) {
        // Waits for checked-out connections to come back first.
        self.pool.close().await;
        debug!("Upload ledger closed");
    }
}

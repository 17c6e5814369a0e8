//! Upload ledger port (driven/secondary port)
//!
//! The ledger is the only state shared by every concurrent task of a running
//! server: upload tasks stamp it, the catch-up pass reads it, and the
//! `ignore`/`reupload` commands edit it. Implementations serialize access
//! internally so callers never need their own locking.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - A stored timestamp that cannot be parsed is reported as absent by
//!   [`UploadLedger::last_upload`] and skipped by [`UploadLedger::entries`];
//!   it is never surfaced as an error.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::LedgerEntry;

#[async_trait::async_trait]
pub trait UploadLedger: Send + Sync {
    /// Returns the last recorded upload time of `path`, or `None` if the
    /// path was never uploaded (or its record is unreadable)
    async fn last_upload(&self, path: &Path) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Records `at` as the upload time of every path in `paths`
    async fn record(&self, at: DateTime<Utc>, paths: &[PathBuf]) -> anyhow::Result<()>;

    /// Stamps every path in `paths` with the current time and returns it
    async fn set_now(&self, paths: &[PathBuf]) -> anyhow::Result<DateTime<Utc>> {
        let now = Utc::now();
        self.record(now, paths).await?;
        Ok(now)
    }

    /// Deletes the records of `paths`, returning how many existed
    async fn delete(&self, paths: &[PathBuf]) -> anyhow::Result<u64>;

    /// Returns every readable entry, sorted by path
    async fn entries(&self) -> anyhow::Result<Vec<LedgerEntry>>;

    /// Releases the backing store. Further calls fail.
    async fn close(&self);
}

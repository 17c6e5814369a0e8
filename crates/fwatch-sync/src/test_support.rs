//! In-memory collaborators shared by the unit tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use fwatch_core::domain::LedgerEntry;
use fwatch_core::ports::{UploadLedger, Uploader};

#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<PathBuf, DateTime<Utc>>>,
    pub fail_writes: bool,
}

impl MemoryLedger {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn get(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.entries.lock().unwrap().get(path).copied()
    }
}

#[async_trait::async_trait]
impl UploadLedger for MemoryLedger {
    async fn last_upload(&self, path: &Path) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.get(path))
    }

    async fn record(&self, at: DateTime<Utc>, paths: &[PathBuf]) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("ledger is read-only");
        }
        let mut entries = self.entries.lock().unwrap();
        for path in paths {
            entries.insert(path.clone(), at);
        }
        Ok(())
    }

    async fn delete(&self, paths: &[PathBuf]) -> anyhow::Result<u64> {
        let mut entries = self.entries.lock().unwrap();
        Ok(paths.iter().filter(|p| entries.remove(*p).is_some()).count() as u64)
    }

    async fn entries(&self) -> anyhow::Result<Vec<LedgerEntry>> {
        let mut all: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(path, at)| LedgerEntry {
                path: path.clone(),
                uploaded_at: *at,
            })
            .collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(all)
    }

    async fn close(&self) {}
}

/// Uploader that records when each upload started and optionally fails
#[derive(Default)]
pub struct RecordingUploader {
    pub delay: Duration,
    pub fail: bool,
    calls: Mutex<Vec<(PathBuf, Instant)>>,
}

impl RecordingUploader {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, _group: &str, path: &Path) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), Instant::now()));
        tokio::time::sleep(self.delay).await;
        if self.fail {
            anyhow::bail!("remote refused {}", path.display());
        }
        Ok(())
    }
}

//! Upload bookkeeping types
//!
//! - [`TrackedFile`] - a file a change source currently knows about
//! - [`LedgerEntry`] - the last recorded upload of a path
//! - [`UploadOutcome`] - result of one upload task
//! - [`needs_upload`] - the catch-up rule comparing the two timestamps

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A regular file tracked by a change source, with its modification time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl TrackedFile {
    pub fn new(path: PathBuf, modified: SystemTime) -> Self {
        Self {
            path,
            modified: DateTime::<Utc>::from(modified),
        }
    }
}

/// One row of the upload ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
}

/// Result of a single upload task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The transport succeeded and the ledger was stamped at `at`
    Uploaded { at: DateTime<Utc> },
    /// The transport failed; the ledger was left untouched
    Failed { reason: String },
    /// The transport succeeded but stamping the ledger failed
    NotRecorded { reason: String },
}

/// Catch-up rule: a path is uploaded when it has never been uploaded, or
/// when its last recorded upload is strictly earlier than its modification
/// time.
pub fn needs_upload(last_upload: Option<DateTime<Utc>>, modified: DateTime<Utc>) -> bool {
    match last_upload {
        Some(last) => last < modified,
        None => true,
    }
}

//! fwatch Ledger - Durable record of uploads
//!
//! SQLite-based store mapping each uploaded path to the time of its last
//! successful upload. The catch-up pass compares these timestamps with file
//! modification times to decide what still needs uploading after a restart.
//!
//! ## Architecture
//!
//! This crate implements the `UploadLedger` port from `fwatch-core` using
//! SQLite as the storage backend.
//!
//! ## Key Components
//!
//! - [`SqliteLedger`] - `UploadLedger` implementation over a WAL database
//! - [`LedgerError`] - Error types for ledger operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use fwatch_ledger::SqliteLedger;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ledger = SqliteLedger::open(Path::new("/var/lib/fwatch/uploads.db")).await?;
//! // Use ledger as UploadLedger...
//! # Ok(())
//! # }
//! ```

pub mod ledger;

pub use ledger::SqliteLedger;

/// Errors that can occur during ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::QueryFailed(e.to_string())
    }
}

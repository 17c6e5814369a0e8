//! fwatch Sync - change detection and upload scheduling
//!
//! Provides:
//! - Polling change sources producing per-group change events
//! - Per-path settle timers that coalesce bursts of changes
//! - Tracked upload tasks that stamp the ledger on success
//! - A server that supervises every group and shuts down in order
//!
//! ## Modules
//!
//! - [`watcher`] - `ChangeSource` port and the `notify`-based polling implementation
//! - [`debounce`] - `SettleQueue` and the per-group event loop
//! - [`upload`] - upload execution, in-flight tracking and the simulated transport
//! - [`server`] - group supervision, catch-up and the shutdown sequence

pub mod debounce;
pub mod server;
pub mod upload;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::PathBuf;

use thiserror::Error;

pub use server::{Group, Server, StopHandle};

/// Errors that can occur while setting up or running the scheduler
#[derive(Debug, Error)]
pub enum SyncError {
    /// A configured root path could not be resolved
    #[error("group {group}: cannot access {}: {source}", path.display())]
    RootInaccessible {
        group: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A change source failed after startup
    #[error("group {group}: change source failed: {message}")]
    SourceFailed { group: String, message: String },

    /// A domain-level error propagated from fwatch-core
    #[error(transparent)]
    Domain(#[from] fwatch_core::domain::DomainError),

    /// The upload ledger rejected an operation
    #[error("ledger error: {0:#}")]
    Ledger(anyhow::Error),

    /// An I/O error occurred outside of root resolution
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Domain entities and business rules
//!
//! - Watch group settings resolved from configuration
//! - Tracked files, ledger entries and upload outcomes
//! - The catch-up rule deciding whether a file needs uploading
//! - Domain-specific error types

pub mod errors;
pub mod group;
pub mod upload;

// Re-export commonly used types
pub use errors::DomainError;
pub use group::{GroupSettings, DEFAULT_POLL, DEFAULT_SETTLE, MAX_SETTLE};
pub use upload::{needs_upload, LedgerEntry, TrackedFile, UploadOutcome};

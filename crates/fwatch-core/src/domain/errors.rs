//! Domain error types
//!
//! Errors raised while turning configuration into watch groups or while
//! resolving user-supplied targets. Messages are stored as strings so the
//! type stays `Clone` and comparable in tests.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The `database` field is missing from the configuration
    #[error("'database' not set in config")]
    MissingDatabase,

    /// The configuration declares no groups under `files`
    #[error("no groups set in config")]
    NoGroups,

    /// A group declares no root paths
    #[error("group {0} has no paths")]
    EmptyGroup(String),

    /// A group's `filename_match` is not a valid regular expression
    #[error("group {group}: invalid filename_match: {message}")]
    InvalidPattern {
        /// The group that declared the pattern
        group: String,
        /// Compiler error from the regex engine
        message: String,
    },

    /// A command-line target is neither a known group nor an existing file
    #[error("unknown file or group {0:?}")]
    UnknownTarget(String),

    /// A named group does not exist
    #[error("{0:?} is not a group")]
    UnknownGroup(String),
}

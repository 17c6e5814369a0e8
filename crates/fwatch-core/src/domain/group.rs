//! Watch group settings
//!
//! A [`GroupSettings`] is the resolved, immutable description of one named
//! group from the configuration: where to look, which files count, and how
//! long a file must stay quiet before it is uploaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use super::errors::DomainError;

/// Default quiet period before a changed file is uploaded
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(20 * 60);

/// Longest accepted settle time; the settle timers cannot hold more
pub const MAX_SETTLE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default period between filesystem polls
pub const DEFAULT_POLL: Duration = Duration::from_secs(5 * 60);

/// Resolved settings for one watch group
///
/// Built from [`GroupConfig`](crate::config::GroupConfig) by
/// [`Config::group_settings`](crate::config::Config::group_settings), or
/// directly through the builder-style methods in tests.
#[derive(Debug, Clone)]
pub struct GroupSettings {
    /// Unique group name (the key under `files`)
    pub name: String,
    /// Root paths; each may be a directory or a single file
    pub roots: Vec<PathBuf>,
    /// Whether directories below the roots are traversed
    pub recursive: bool,
    /// Optional filter applied to file names (not full paths)
    pub filter: Option<Regex>,
    /// Quiet period after the last change before upload
    pub settle: Duration,
    /// Period of the change source's polling loop
    pub poll: Duration,
    /// Upload recipients; carried through, never interpreted by the scheduler
    pub recipients: Vec<String>,
}

impl GroupSettings {
    /// Creates settings with default timings, no filter and no recursion
    pub fn new(name: impl Into<String>, roots: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            roots,
            recursive: false,
            filter: None,
            settle: DEFAULT_SETTLE,
            poll: DEFAULT_POLL,
            recipients: Vec::new(),
        }
    }

    /// Compiles `pattern` and installs it as the file-name filter
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidPattern`] if the pattern does not compile.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self, DomainError> {
        let regex = Regex::new(pattern).map_err(|e| DomainError::InvalidPattern {
            group: self.name.clone(),
            message: e.to_string(),
        })?;
        self.filter = Some(regex);
        Ok(self)
    }

    /// Sets the settle time, capped at [`MAX_SETTLE`]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle.min(MAX_SETTLE);
        self
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Returns true if the file name of `path` passes the group's filter
    ///
    /// Paths without a UTF-8 file name only pass when no filter is set.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| filter.is_match(name))
    }
}

//! Change sources
//!
//! A [`ChangeSource`] produces the raw [`ChangeEvent`] stream of one watch
//! group and keeps a live view of the files it currently tracks.
//! [`PollingChangeSource`] is the shipped implementation: a `walkdir`
//! snapshot taken at construction, kept current by a `notify::PollWatcher`
//! running at the group's poll period.
//!
//! ## Architecture
//!
//! ```text
//! PollWatcher thread ──→ unbounded channel ──→ PollingChangeSource::run ──→ mpsc::Sender<ChangeEvent>
//!                                                       │
//!                                              tracked: DashMap<PathBuf, mtime>
//! ```
//!
//! The watcher's callback only ever talks to the intermediate channel owned
//! by `run`, so the outgoing sender is dropped exactly when `run` returns.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use fwatch_core::domain::{GroupSettings, TrackedFile};

use crate::SyncError;

// ============================================================================
// ChangeEvent
// ============================================================================

/// What happened to a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    /// The file now at the event's path was previously at `from`. When only
    /// the departure was observed, `from` equals the event path.
    Renamed { from: PathBuf },
}

/// A filesystem change observed by a change source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_dir: bool,
}

impl ChangeEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::file(path.into(), ChangeKind::Created)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::file(path.into(), ChangeKind::Modified)
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::file(path.into(), ChangeKind::Removed)
    }

    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::file(to.into(), ChangeKind::Renamed { from: from.into() })
    }

    fn file(path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            is_dir: false,
        }
    }

    /// Marks the event as concerning a directory
    pub fn for_dir(mut self) -> Self {
        self.is_dir = true;
        self
    }

    /// Returns the path whose pending upload this event cancels, if any
    ///
    /// Removals cancel their own path; renames cancel the path the file
    /// was renamed away from.
    pub fn cancels(&self) -> Option<&Path> {
        match &self.kind {
            ChangeKind::Removed => Some(&self.path),
            ChangeKind::Renamed { from } => Some(from),
            ChangeKind::Created | ChangeKind::Modified => None,
        }
    }
}

// ============================================================================
// ChangeSource port
// ============================================================================

/// Provider of change events and tracked-file snapshots for one group
#[async_trait::async_trait]
pub trait ChangeSource: Send + Sync {
    /// Files currently tracked, sorted by path
    fn tracked_files(&self) -> Vec<TrackedFile>;

    /// Emits change events into `events` until [`close`](Self::close) is
    /// called or the receiver goes away
    ///
    /// # Errors
    /// Any error is fatal for the whole server.
    async fn run(&self, events: mpsc::Sender<ChangeEvent>) -> Result<()>;

    /// Asks a running [`run`](Self::run) to return. Idempotent.
    fn close(&self);
}

// ============================================================================
// PollingChangeSource
// ============================================================================

/// Change source backed by `notify`'s polling watcher
pub struct PollingChangeSource {
    settings: GroupSettings,
    /// Canonicalized roots
    roots: Vec<PathBuf>,
    tracked: DashMap<PathBuf, DateTime<Utc>>,
    closed: CancellationToken,
}

impl PollingChangeSource {
    /// Resolves the group's roots and takes the initial snapshot
    ///
    /// # Errors
    /// Returns [`SyncError::RootInaccessible`] if any root cannot be
    /// canonicalized.
    pub fn new(settings: &GroupSettings) -> Result<Self, SyncError> {
        let roots = settings
            .roots
            .iter()
            .map(|root| {
                std::fs::canonicalize(root).map_err(|source| SyncError::RootInaccessible {
                    group: settings.name.clone(),
                    path: root.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let source = Self {
            settings: settings.clone(),
            roots,
            tracked: DashMap::new(),
            closed: CancellationToken::new(),
        };
        source.snapshot();

        info!(
            group = %source.settings.name,
            roots = source.roots.len(),
            tracked = source.tracked.len(),
            recursive = source.settings.recursive,
            "Change source ready"
        );

        Ok(source)
    }

    /// Walks every root and records the regular files passing the filter
    ///
    /// Symlinks are followed, matching what live events see through
    /// `fs::metadata`.
    fn snapshot(&self) {
        let max_depth = if self.settings.recursive { usize::MAX } else { 1 };

        for root in &self.roots {
            for entry in WalkDir::new(root).follow_links(true).max_depth(max_depth) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(group = %self.settings.name, error = %err, "Skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !self.settings.matches(entry.path()) {
                    continue;
                }
                match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                    Some(modified) => {
                        self.tracked
                            .insert(entry.path().to_path_buf(), DateTime::<Utc>::from(modified));
                    }
                    None => {
                        warn!(path = %entry.path().display(), "Cannot read modification time");
                    }
                }
            }
        }
    }

    /// Applies a mapped event to the tracked set and decides whether it
    /// should be forwarded
    ///
    /// Fills in `is_dir` from the filesystem. Non-directory events for
    /// names that fail the group's filter are dropped.
    fn observe(&self, mut event: ChangeEvent) -> Option<ChangeEvent> {
        if let Some(gone) = event.cancels() {
            self.forget(gone);
        }

        let metadata = match event.kind {
            ChangeKind::Removed => None,
            _ => std::fs::metadata(&event.path).ok(),
        };
        event.is_dir = metadata.as_ref().is_some_and(|m| m.is_dir());
        if event.is_dir {
            return Some(event);
        }

        let relevant = match &event.kind {
            ChangeKind::Renamed { from } => {
                self.settings.matches(from) || self.settings.matches(&event.path)
            }
            _ => self.settings.matches(&event.path),
        };
        if !relevant {
            debug!(path = %event.path.display(), "Filtered out change event");
            return None;
        }

        if let Some(modified) = metadata.filter(|m| m.is_file()).and_then(|m| m.modified().ok()) {
            if self.settings.matches(&event.path) {
                self.tracked
                    .insert(event.path.clone(), DateTime::<Utc>::from(modified));
            }
        }

        Some(event)
    }

    /// Drops `path` and anything below it from the tracked set
    fn forget(&self, path: &Path) {
        self.tracked.retain(|tracked, _| !tracked.starts_with(path));
    }
}

#[async_trait::async_trait]
impl ChangeSource for PollingChangeSource {
    fn tracked_files(&self) -> Vec<TrackedFile> {
        let mut files: Vec<_> = self
            .tracked
            .iter()
            .map(|entry| TrackedFile {
                path: entry.key().clone(),
                modified: *entry.value(),
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    async fn run(&self, events: mpsc::Sender<ChangeEvent>) -> Result<()> {
        let group = &self.settings.name;
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();

        let config = notify::Config::default().with_poll_interval(self.settings.poll);
        let mut watcher = PollWatcher::new(
            move |res: notify::Result<notify::Event>| {
                // The receiver only disappears once run() is returning
                let _ = raw_tx.send(res);
            },
            config,
        )
        .context("Failed to create poll watcher")?;

        let mode = if self.settings.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        for root in &self.roots {
            watcher
                .watch(root, mode)
                .with_context(|| format!("Failed to watch path: {}", root.display()))?;
        }

        info!(
            group = %group,
            poll_ms = self.settings.poll.as_millis() as u64,
            "Watching for changes"
        );

        'events: loop {
            tokio::select! {
                _ = self.closed.cancelled() => break,
                raw = raw_rx.recv() => match raw {
                    Some(Ok(event)) => {
                        for change in map_notify_event(&event) {
                            let Some(change) = self.observe(change) else {
                                continue;
                            };
                            debug!(group = %group, event = ?change, "Change detected");
                            if events.send(change).await.is_err() {
                                debug!(group = %group, "Event receiver dropped");
                                break 'events;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        return Err(anyhow!(err).context(format!("watching group {group}")));
                    }
                    None => break,
                },
            }
        }

        drop(watcher);
        info!(group = %group, "Change source stopped");
        Ok(())
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

// ============================================================================
// Event mapping - notify::Event → ChangeEvent
// ============================================================================

/// Converts a `notify::Event` into zero or more [`ChangeEvent`]s
///
/// - `Create(*)` and `Modify(Name(To))` -> `Created`
/// - `Modify(Name(Both))` with 2 paths -> `Renamed`
/// - `Modify(Name(From))` -> `Renamed` away from the path
/// - `Remove(*)` -> `Removed`, one per path
/// - Other `Modify(*)` -> `Modified`
///
/// Access events and events without paths yield nothing. `is_dir` is left
/// unset; the source fills it in.
fn map_notify_event(event: &notify::Event) -> Vec<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().cloned().map(ChangeEvent::created).collect()
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() >= 2 => {
            vec![ChangeEvent::renamed(paths[0].clone(), paths[1].clone())]
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .iter()
            .map(|p| ChangeEvent::renamed(p.clone(), p.clone()))
            .collect(),

        EventKind::Remove(_) => paths.iter().cloned().map(ChangeEvent::removed).collect(),

        EventKind::Modify(_) => paths.iter().cloned().map(ChangeEvent::modified).collect(),

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            Vec::new()
        }
    }
}

//! Group supervision and orderly shutdown
//!
//! [`Server::start`] runs every group until a stop is requested through a
//! [`StopHandle`] or a change source fails, then tears down in a fixed
//! order:
//!
//! 1. close every change source
//! 2. wait for the source tasks, the group schedulers and the catch-up pass
//! 3. drain in-flight uploads
//! 4. close the ledger
//!
//! The same type also backs the one-shot commands (`list`, `ignore`,
//! `reupload`, `list-uploads`) that only read the tracked files or edit the
//! ledger without starting anything.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fwatch_core::domain::{needs_upload, DomainError, GroupSettings, LedgerEntry, TrackedFile};
use fwatch_core::ports::{UploadLedger, Uploader};

use crate::debounce::GroupScheduler;
use crate::upload::UploadExecutor;
use crate::watcher::ChangeSource;
use crate::SyncError;

/// How long shutdown waits quietly for uploads before saying so
const DRAIN_PATIENCE: Duration = Duration::from_millis(200);

/// Capacity of each group's event channel
const EVENT_BUFFER: usize = 1024;

// ============================================================================
// Group
// ============================================================================

/// A configured group together with its live change source
pub struct Group {
    pub settings: GroupSettings,
    pub source: Arc<dyn ChangeSource>,
}

impl Group {
    pub fn new(settings: GroupSettings, source: Arc<dyn ChangeSource>) -> Self {
        Self { settings, source }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }
}

// ============================================================================
// StopHandle
// ============================================================================

/// One-shot external stop request for a running [`Server`]
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
    delivered: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown
    ///
    /// Returns `true` for the call that delivered the request. Later calls
    /// are logged and ignored.
    pub fn stop(&self) -> bool {
        if self.delivered.swap(true, Ordering::AcqRel) {
            warn!("Stop already requested, ignoring");
            return false;
        }
        info!("Stop requested");
        self.token.cancel();
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`stop`](Self::stop) has been called
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }
}

// ============================================================================
// Server
// ============================================================================

/// Owns the groups, the ledger and the upload executor
pub struct Server {
    groups: Vec<Group>,
    ledger: Arc<dyn UploadLedger>,
    executor: UploadExecutor,
    stop: StopHandle,
}

impl Server {
    pub fn new(groups: Vec<Group>, ledger: Arc<dyn UploadLedger>, uploader: Arc<dyn Uploader>) -> Self {
        let executor = UploadExecutor::new(uploader, Arc::clone(&ledger));
        Self {
            groups,
            ledger,
            executor,
            stop: StopHandle::new(),
        }
    }

    /// Handle that stops [`start`](Self::start) from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name() == name)
    }

    /// Runs every group until stopped, then shuts down in order
    ///
    /// Returns `Ok(())` after an explicit stop, or the first change source
    /// failure. In both cases all uploads have finished and the ledger is
    /// closed when this returns.
    pub async fn start(self) -> Result<(), SyncError> {
        let Server {
            groups,
            ledger,
            executor,
            stop,
        } = self;

        info!(groups = groups.len(), "Starting server");

        let shutdown = CancellationToken::new();
        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<SyncError>();
        let mut tasks = JoinSet::new();

        let snapshot: Vec<(String, Vec<TrackedFile>)> = groups
            .iter()
            .map(|g| (g.name().to_string(), g.source.tracked_files()))
            .collect();
        tasks.spawn(catch_up(
            snapshot,
            Arc::clone(&ledger),
            executor.clone(),
            shutdown.clone(),
        ));

        for group in &groups {
            let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

            let source = Arc::clone(&group.source);
            let name = group.name().to_string();
            let errors = err_tx.clone();
            tasks.spawn(async move {
                if let Err(e) = source.run(events_tx).await {
                    let message = format!("{e:#}");
                    error!(group = %name, error = %message, "Change source failed");
                    let _ = errors.send(SyncError::SourceFailed {
                        group: name,
                        message,
                    });
                }
            });

            let scheduler = GroupScheduler::new(&group.settings, events_rx, executor.clone());
            tasks.spawn(async move {
                scheduler.run().await;
            });
        }
        drop(err_tx);

        let failure = tokio::select! {
            _ = stop.stopped() => None,
            Some(err) = err_rx.recv() => Some(err),
        };

        info!("Stopping server");
        shutdown.cancel();
        for group in &groups {
            group.source.close();
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Server task panicked");
            }
        }
        debug!("All group tasks stopped");

        executor.drain(DRAIN_PATIENCE).await;
        ledger.close().await;

        while let Ok(extra) = err_rx.try_recv() {
            warn!(error = %extra, "Additional failure during shutdown");
        }

        match failure {
            Some(err) => {
                error!(error = %err, "Server stopped after failure");
                Err(err)
            }
            None => {
                info!("Server stopped");
                Ok(())
            }
        }
    }

    /// Tracked files of the named groups (all groups when `names` is
    /// empty), sorted by path without duplicates
    pub fn list(&self, names: &[String]) -> Result<Vec<TrackedFile>, SyncError> {
        let selected: Vec<&Group> = if names.is_empty() {
            self.groups.iter().collect()
        } else {
            names
                .iter()
                .map(|name| {
                    self.group(name)
                        .ok_or_else(|| DomainError::UnknownGroup(name.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        let files: BTreeMap<PathBuf, TrackedFile> = selected
            .iter()
            .flat_map(|g| g.source.tracked_files())
            .map(|f| (f.path.clone(), f))
            .collect();

        Ok(files.into_values().collect())
    }

    /// Resolves a command-line target to the paths it designates
    ///
    /// A group name wins over a file of the same name. A file is accepted
    /// anywhere on disk and canonicalized.
    pub fn resolve_target(&self, target: &str) -> Result<Vec<PathBuf>, SyncError> {
        if let Some(group) = self.group(target) {
            let paths: Vec<PathBuf> = group
                .source
                .tracked_files()
                .into_iter()
                .map(|f| f.path)
                .collect();
            if paths.is_empty() {
                return Err(DomainError::UnknownTarget(target.to_string()).into());
            }
            return Ok(paths);
        }

        match std::fs::canonicalize(target) {
            Ok(path) if path.is_file() => Ok(vec![path]),
            _ => Err(DomainError::UnknownTarget(target.to_string()).into()),
        }
    }

    /// Marks every path of `target` as uploaded now without uploading
    pub async fn ignore(&self, target: &str) -> Result<(DateTime<Utc>, Vec<PathBuf>), SyncError> {
        let paths = self.resolve_target(target)?;
        let at = self.ledger.set_now(&paths).await.map_err(SyncError::Ledger)?;
        info!(requested = %target, count = paths.len(), "Marked as uploaded");
        Ok((at, paths))
    }

    /// Forgets the uploads of every path of `target` so they are uploaded
    /// again on the next start
    pub async fn reupload(&self, target: &str) -> Result<(u64, Vec<PathBuf>), SyncError> {
        let paths = self.resolve_target(target)?;
        let removed = self.ledger.delete(&paths).await.map_err(SyncError::Ledger)?;
        info!(requested = %target, count = paths.len(), removed, "Upload records cleared");
        Ok((removed, paths))
    }

    pub async fn list_uploads(&self) -> Result<Vec<LedgerEntry>, SyncError> {
        self.ledger.entries().await.map_err(SyncError::Ledger)
    }

    /// Releases the sources and the ledger without starting
    pub async fn close(self) {
        for group in &self.groups {
            group.source.close();
        }
        self.ledger.close().await;
    }
}

/// Uploads every tracked file changed since its last recorded upload
async fn catch_up(
    snapshot: Vec<(String, Vec<TrackedFile>)>,
    ledger: Arc<dyn UploadLedger>,
    executor: UploadExecutor,
    shutdown: CancellationToken,
) {
    let mut submitted = 0usize;

    for (group, files) in snapshot {
        for file in files {
            if shutdown.is_cancelled() {
                info!(submitted, "Catch-up interrupted by shutdown");
                return;
            }

            let last = match ledger.last_upload(&file.path).await {
                Ok(last) => last,
                Err(e) => {
                    warn!(
                        path = %file.path.display(),
                        error = %format!("{e:#}"),
                        "Cannot read upload record, treating as never uploaded"
                    );
                    None
                }
            };

            if needs_upload(last, file.modified) {
                debug!(group = %group, path = %file.path.display(), "Catch-up upload");
                drop(executor.submit(&group, file.path));
                submitted += 1;
            }
        }
    }

    info!(submitted, "Catch-up complete");
}

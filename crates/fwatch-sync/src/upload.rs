//! Upload execution
//!
//! Every upload runs as its own task on a shared [`TaskTracker`], which is
//! also the in-flight count the shutdown sequence drains. A task performs
//! exactly one transfer through the [`Uploader`] port and stamps the ledger
//! only when the transfer succeeded. Nothing is retried; a file whose upload
//! failed is picked up again by the next catch-up pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use fwatch_core::domain::UploadOutcome;
use fwatch_core::ports::{UploadLedger, Uploader};

/// Spawns and tracks upload tasks
#[derive(Clone)]
pub struct UploadExecutor {
    uploader: Arc<dyn Uploader>,
    ledger: Arc<dyn UploadLedger>,
    tracker: TaskTracker,
}

impl UploadExecutor {
    pub fn new(uploader: Arc<dyn Uploader>, ledger: Arc<dyn UploadLedger>) -> Self {
        Self {
            uploader,
            ledger,
            tracker: TaskTracker::new(),
        }
    }

    /// Starts uploading `path` on behalf of `group`
    ///
    /// The task is counted as in flight until it finishes, whether or not
    /// the returned handle is awaited.
    pub fn submit(&self, group: &str, path: PathBuf) -> JoinHandle<UploadOutcome> {
        let uploader = Arc::clone(&self.uploader);
        let ledger = Arc::clone(&self.ledger);
        let group = group.to_string();

        self.tracker
            .spawn(async move { execute(&*uploader, &*ledger, &group, &path).await })
    }

    /// Number of upload tasks that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every submitted upload has finished
    ///
    /// Logs a single notice if the uploads are still running after
    /// `patience`, then keeps waiting without a limit.
    pub async fn drain(&self, patience: Duration) {
        self.tracker.close();

        if tokio::time::timeout(patience, self.tracker.wait())
            .await
            .is_err()
        {
            info!(in_flight = self.in_flight(), "waiting for uploads to complete...");
            self.tracker.wait().await;
        }
    }
}

async fn execute(
    uploader: &dyn Uploader,
    ledger: &dyn UploadLedger,
    group: &str,
    path: &Path,
) -> UploadOutcome {
    if let Err(e) = uploader.upload(group, path).await {
        let reason = format!("{e:#}");
        warn!(group, path = %path.display(), error = %reason, "Upload failed");
        return UploadOutcome::Failed { reason };
    }

    match ledger.set_now(&[path.to_path_buf()]).await {
        Ok(at) => {
            info!(group, path = %path.display(), "Upload recorded");
            UploadOutcome::Uploaded { at }
        }
        Err(e) => {
            let reason = format!("{e:#}");
            error!(
                group,
                path = %path.display(),
                error = %reason,
                "Upload succeeded but could not be recorded"
            );
            UploadOutcome::NotRecorded { reason }
        }
    }
}

// ============================================================================
// SimulatedUploader
// ============================================================================

/// Transport stand-in that takes a fixed time and always succeeds
#[derive(Debug, Clone)]
pub struct SimulatedUploader {
    delay: Duration,
}

impl SimulatedUploader {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl Uploader for SimulatedUploader {
    async fn upload(&self, group: &str, path: &Path) -> anyhow::Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(group, "uploading {name}...");
        tokio::time::sleep(self.delay).await;
        info!(group, "uploading {name}... done");
        Ok(())
    }
}

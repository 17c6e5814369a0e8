//! Settle timers and the per-group event loop
//!
//! The [`SettleQueue`] holds at most one pending upload per path. Every
//! qualifying change pushes the path's deadline out to `now + settle`, so a
//! file that keeps changing is never uploaded mid-write. The
//! [`GroupScheduler`] owns one queue and is the only task that touches it.
//!
//! ## Flow
//!
//! ```text
//! ChangeSource ──→ mpsc::Receiver ──→ GroupScheduler ──→ UploadExecutor::submit
//!                                          │
//!                                     SettleQueue (DelayQueue)
//! ```

use std::collections::HashMap;
use std::future::poll_fn;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::time::delay_queue::{DelayQueue, Key};
use tracing::{debug, info};

use fwatch_core::domain::{GroupSettings, MAX_SETTLE};

use crate::upload::UploadExecutor;
use crate::watcher::ChangeEvent;

// ============================================================================
// SettleQueue
// ============================================================================

/// Per-path timers that fire once a path has been quiet for the settle time
///
/// Must be used from within a tokio runtime. Settle times above
/// [`MAX_SETTLE`] are capped to it, the longest delay the timer wheel holds.
pub struct SettleQueue {
    settle: Duration,
    timers: DelayQueue<PathBuf>,
    keys: HashMap<PathBuf, Key>,
}

impl SettleQueue {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle: settle.min(MAX_SETTLE),
            timers: DelayQueue::new(),
            keys: HashMap::new(),
        }
    }

    /// Starts or restarts the settle timer for `path`
    ///
    /// Returns `true` if a new pending job was created, `false` if an
    /// existing one was pushed back.
    pub fn push(&mut self, path: PathBuf) -> bool {
        if let Some(key) = self.keys.get(&path) {
            self.timers.reset(key, self.settle);
            return false;
        }

        let key = self.timers.insert(path.clone(), self.settle);
        self.keys.insert(path, key);
        true
    }

    /// Drops the pending job for `path` without firing it
    pub fn cancel(&mut self, path: &Path) -> bool {
        match self.keys.remove(path) {
            Some(key) => {
                self.timers.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Waits for the next path to settle and removes it from the queue
    ///
    /// Returns `None` straight away when nothing is pending.
    pub async fn next_settled(&mut self) -> Option<PathBuf> {
        let expired = poll_fn(|cx| self.timers.poll_expired(cx)).await?;
        let path = expired.into_inner();
        self.keys.remove(&path);
        Some(path)
    }

    /// Drops every pending job without firing it
    pub fn clear(&mut self) {
        self.timers.clear();
        self.keys.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.keys.len()
    }
}

// ============================================================================
// GroupScheduler
// ============================================================================

/// Turns one group's change events into upload submissions
pub struct GroupScheduler {
    group: String,
    events: mpsc::Receiver<ChangeEvent>,
    queue: SettleQueue,
    executor: UploadExecutor,
}

impl GroupScheduler {
    pub fn new(
        settings: &GroupSettings,
        events: mpsc::Receiver<ChangeEvent>,
        executor: UploadExecutor,
    ) -> Self {
        debug!(
            group = %settings.name,
            settle_ms = settings.settle.as_millis() as u64,
            "Creating group scheduler"
        );

        Self {
            group: settings.name.clone(),
            events,
            queue: SettleQueue::new(settings.settle),
            executor,
        }
    }

    /// Processes events until the channel closes
    ///
    /// Jobs still pending at that point are dropped without firing; their
    /// count is returned.
    pub async fn run(mut self) -> usize {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                Some(path) = self.queue.next_settled() => {
                    info!(group = %self.group, path = %path.display(), "File settled, uploading");
                    // Outcomes are logged by the task itself
                    drop(self.executor.submit(&self.group, path));
                }
            }
        }

        let dropped = self.queue.pending_count();
        self.queue.clear();
        if dropped > 0 {
            info!(group = %self.group, dropped, "Dropped pending uploads");
        }
        debug!(group = %self.group, "Group scheduler stopped");
        dropped
    }

    fn handle(&mut self, event: ChangeEvent) {
        if event.is_dir {
            debug!(group = %self.group, path = %event.path.display(), "Ignoring directory event");
            return;
        }

        if let Some(path) = event.cancels() {
            if self.queue.cancel(path) {
                debug!(group = %self.group, path = %path.display(), "Pending upload cancelled");
            }
            return;
        }

        if self.queue.push(event.path.clone()) {
            debug!(
                group = %self.group,
                path = %event.path.display(),
                pending = self.queue.pending_count(),
                "Pending upload created"
            );
        } else {
            debug!(group = %self.group, path = %event.path.display(), "Settle timer reset");
        }
    }
}

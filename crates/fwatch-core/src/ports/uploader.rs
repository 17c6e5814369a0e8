//! Upload transport port
//!
//! The scheduler only needs to know whether an upload of one file succeeded.
//! How the bytes travel, and to whom, is the implementation's business.

use std::path::Path;

#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads the file at `path` on behalf of `group`
    ///
    /// # Errors
    /// Any error means the file was not delivered; the caller will not
    /// record the upload.
    async fn upload(&self, group: &str, path: &Path) -> anyhow::Result<()>;
}

//! Reupload command - forget the uploads of a group or file
//!
//! The files are uploaded again by the catch-up pass of the next `start`.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::open_server;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ReuploadCommand {
    /// Group name or path of an existing file
    pub target: String,
}

impl ReuploadCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let server = open_server(config_path).await?;
        let cleared = server.reupload(&self.target).await;
        server.close().await;
        let (removed, paths) = cleared?;

        formatter.success(&format!(
            "Cleared {removed} upload record(s) for {}; {} file(s) will be uploaded on next start",
            self.target,
            paths.len()
        ));
        for path in &paths {
            formatter.info(&path.display().to_string());
        }
        Ok(())
    }
}

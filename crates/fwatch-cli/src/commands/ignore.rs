//! Ignore command - record a group or file as uploaded without uploading it

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{display_time, open_server};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct IgnoreCommand {
    /// Group name or path of an existing file
    pub target: String,
}

impl IgnoreCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let server = open_server(config_path).await?;
        let ignored = server.ignore(&self.target).await;
        server.close().await;
        let (at, paths) = ignored?;

        formatter.success(&format!(
            "Marked {} file(s) from {} as uploaded at {}",
            paths.len(),
            self.target,
            display_time(at)
        ));
        for path in &paths {
            formatter.info(&path.display().to_string());
        }
        Ok(())
    }
}

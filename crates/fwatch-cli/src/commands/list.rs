//! List command - print the files tracked by some or all groups

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{display_time, open_server};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Groups to list; every group when omitted
    pub groups: Vec<String>,
}

impl ListCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let server = open_server(config_path).await?;
        let listed = server.list(&self.groups);
        server.close().await;
        let files = listed?;

        if format.is_json() {
            let json: Vec<_> = files
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "path": f.path.display().to_string(),
                        "modified": display_time(f.modified),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::Value::Array(json));
            return Ok(());
        }

        for file in &files {
            formatter.line(&file.path.display().to_string());
        }
        Ok(())
    }
}

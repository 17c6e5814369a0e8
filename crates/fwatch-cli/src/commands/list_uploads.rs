//! List-uploads command - print every recorded upload as `path timestamp`

use std::path::Path;

use anyhow::Result;
use clap::Args;

use fwatch_core::domain::LedgerEntry;

use super::{display_time, open_server};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ListUploadsCommand {}

impl ListUploadsCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let server = open_server(config_path).await?;
        let listed = server.list_uploads().await;
        server.close().await;
        let entries = listed?;

        if format.is_json() {
            let json: Vec<_> = entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "path": e.path.display().to_string(),
                        "uploaded_at": display_time(e.uploaded_at),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::Value::Array(json));
            return Ok(());
        }

        for entry in &entries {
            formatter.line(&entry_line(entry));
        }
        Ok(())
    }
}

fn entry_line(entry: &LedgerEntry) -> String {
    format!("{} {}", entry.path.display(), display_time(entry.uploaded_at))
}

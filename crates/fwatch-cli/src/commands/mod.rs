//! Subcommands and the wiring they share
//!
//! Every command builds the same [`Server`] from the configuration file;
//! only `start` runs it; the others read tracked files or edit the ledger
//! and close it again.

pub mod ignore;
pub mod list;
pub mod list_uploads;
pub mod reupload;
pub mod start;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use fwatch_core::config::Config;
use fwatch_ledger::SqliteLedger;
use fwatch_sync::upload::SimulatedUploader;
use fwatch_sync::watcher::PollingChangeSource;
use fwatch_sync::{Group, Server};

/// Loads and validates the configuration, opens the ledger and sets up a
/// change source for every group
pub async fn open_server(config_path: &Path) -> Result<Server> {
    let config = Config::load(config_path)?;

    let problems = config.validate();
    if !problems.is_empty() {
        let details = problems
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        bail!("invalid config {}: {details}", config_path.display());
    }

    let db_path = config.database_path()?;
    let ledger = SqliteLedger::open(db_path)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;

    let mut groups = Vec::new();
    for settings in config.group_settings()? {
        let source = PollingChangeSource::new(&settings)
            .with_context(|| format!("setting up group watcher {}", settings.name))?;
        groups.push(Group::new(settings, Arc::new(source)));
    }
    debug!(config = %config_path.display(), groups = groups.len(), "Server assembled");

    let uploader = Arc::new(SimulatedUploader::new(config.upload_delay));
    Ok(Server::new(groups, Arc::new(ledger), uploader))
}

/// Timestamp as printed by the listing commands
pub fn display_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_display_time_second_precision() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(display_time(at), "2024-03-01T12:00:05Z");
    }

    #[tokio::test]
    async fn test_open_server_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("obs.dat"), b"1").unwrap();
        fs::write(data.join("notes.txt"), b"1").unwrap();

        let config_path = dir.path().join("config.yaml");
        fs::write(
            &config_path,
            format!(
                "database: {db}\nfiles:\n  obs:\n    filename_match: '\\.dat$'\n    paths:\n      - {data}\n",
                db = dir.path().join("uploads.db").display(),
                data = data.display(),
            ),
        )
        .unwrap();

        let server = open_server(&config_path).await.unwrap();
        let files = server.list(&[]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("obs.dat"));
        server.close().await;
    }

    #[tokio::test]
    async fn test_open_server_reports_every_problem() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "poll: 0s\n").unwrap();

        let err = open_server(&config_path).await.err().unwrap();
        let message = format!("{err:#}");
        assert!(message.contains("database"));
        assert!(message.contains("files"));
        assert!(message.contains("poll"));
    }

    #[tokio::test]
    async fn test_open_server_missing_root_names_group() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(
            &config_path,
            format!(
                "database: {db}\nfiles:\n  ghost:\n    paths:\n      - {missing}\n",
                db = dir.path().join("uploads.db").display(),
                missing = dir.path().join("missing").display(),
            ),
        )
        .unwrap();

        let err = open_server(&config_path).await.err().unwrap();
        assert!(format!("{err:#}").contains("setting up group watcher ghost"));
    }

    #[tokio::test]
    async fn test_open_server_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_server(&dir.path().join("absent.yaml")).await.err().unwrap();
        assert!(format!("{err:#}").contains("error opening config file"));
    }
}

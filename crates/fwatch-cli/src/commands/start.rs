//! Start command - run every group until interrupted
//!
//! SIGINT and SIGTERM request an orderly stop: sources close, pending
//! settle timers are dropped, and running uploads finish before the process
//! exits. A second signal only logs that the stop is already under way.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use fwatch_sync::StopHandle;

use super::open_server;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StartCommand {}

impl StartCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let server = open_server(config_path).await?;

        let groups: Vec<String> = server.groups().iter().map(|g| g.name().to_string()).collect();
        info!(config = %config_path.display(), groups = ?groups, "fwatch starting");

        tokio::spawn(shutdown_signal(server.stop_handle()));

        server.start().await.context("fwatch stopped")?;

        formatter.success("Stopped");
        Ok(())
    }
}

/// Forwards SIGINT/SIGTERM to the server's stop handle
async fn shutdown_signal(stop: StopHandle) {
    #[cfg(unix)]
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                None
            }
        };

    loop {
        #[cfg(unix)]
        let terminated = async {
            match terminate.as_mut() {
                Some(signal) => {
                    signal.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminated => {
                info!("Received SIGTERM");
            }
        }

        stop.stop();
    }
}

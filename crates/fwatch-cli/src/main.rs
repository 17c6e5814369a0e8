//! fwatch CLI - watch file groups and upload files once they settle
//!
//! Provides commands for:
//! - Running the watcher until interrupted
//! - Listing tracked files and recorded uploads
//! - Marking files as uploaded, or forgetting their uploads

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fwatch_core::config::Config;

mod commands;
mod output;

use commands::{
    ignore::IgnoreCommand, list::ListCommand, list_uploads::ListUploadsCommand,
    reupload::ReuploadCommand, start::StartCommand,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "fwatch", version, about = "Upload files once they stop changing")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch every group and upload settled files until interrupted
    Start(StartCommand),
    /// List the files tracked by some or all groups
    List(ListCommand),
    /// List every recorded upload
    ListUploads(ListUploadsCommand),
    /// Mark a group or file as uploaded without uploading it
    Ignore(IgnoreCommand),
    /// Forget the uploads of a group or file so they are uploaded again
    Reupload(ReuploadCommand),
}

impl Commands {
    /// Log level used when neither `-v` nor `RUST_LOG` is given
    fn quiet_level(&self) -> &'static str {
        match self {
            Commands::Start(_) => "info",
            _ => "warn",
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = match cli.verbose {
        0 => cli.command.quiet_level(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let format = OutputFormat::from_flag(cli.json);
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    let result = match &cli.command {
        Commands::Start(cmd) => cmd.execute(&config_path, format).await,
        Commands::List(cmd) => cmd.execute(&config_path, format).await,
        Commands::ListUploads(cmd) => cmd.execute(&config_path, format).await,
        Commands::Ignore(cmd) => cmd.execute(&config_path, format).await,
        Commands::Reupload(cmd) => cmd.execute(&config_path, format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            get_formatter(format).error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

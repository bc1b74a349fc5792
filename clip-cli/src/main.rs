//! # uniclip
//!
//! Command-line front end for Uniclip clipboard sync.
//!
//! ## Commands
//!
//! - `init`: Generate a device id and write the configuration
//! - `status`: Show the stored configuration
//! - `sync-mode`: Switch between automatic and manual sync
//! - `run`: Watch the clipboard and sync until interrupted
//!
//! ## Example
//!
//! ```bash
//! # Configure this device
//! uniclip init --stream-url 0xabc/clipboard --private-key <key>
//!
//! # Only sync on request
//! uniclip sync-mode manual
//!
//! # Try it locally with the loopback transport
//! uniclip run --mock
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clip_client::SyncMode;
use std::path::PathBuf;

mod commands;
mod config;

use commands::{init, run, status, sync_mode};

/// Clipboard sync over a pub/sub stream.
#[derive(Parser, Debug)]
#[command(name = "uniclip")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the configuration file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a device id and write the configuration
    Init {
        /// Stream to sync through
        #[arg(long)]
        stream_url: String,

        /// Private key for the stream
        #[arg(long)]
        private_key: String,

        /// Where received files are saved
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },

    /// Show the stored configuration
    Status,

    /// Switch between automatic and manual sync
    SyncMode {
        /// `automatic` or `manual`
        mode: SyncMode,
    },

    /// Watch the clipboard and sync until interrupted
    Run {
        /// Use the in-process loopback transport (for testing/demo)
        #[arg(long)]
        mock: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    match cli.command {
        Commands::Init {
            stream_url,
            private_key,
            download_dir,
        } => {
            init::run(&data_dir, &stream_url, &private_key, download_dir).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
        Commands::SyncMode { mode } => {
            sync_mode::run(&data_dir, mode).await?;
        }
        Commands::Run { mock } => {
            run::run(&data_dir, mock).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Get the default data directory for uniclip.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "uniclip", "uniclip")
        .context("Could not determine home directory")?;
    Ok(dirs.config_dir().to_path_buf())
}

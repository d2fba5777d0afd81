//! mdsync CLI
//!
//! Operator tools for master-data replication.
//!
//! # Commands
//!
//! - `sync-one` - Replicate one document to every sub-account
//! - `resync` - Replicate every document changed since a date
//! - `settings` - Show the parsed settings

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Master-data replication tools.
#[derive(Parser)]
#[command(name = "mdsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(global = true, short, long, default_value = "mdsync.json")]
    settings: PathBuf,

    /// Master account to read from
    #[arg(global = true, short, long)]
    account: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate one document to every sub-account
    SyncOne {
        /// Document id in the master account
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replicate every document, or those changed since a date
    Resync {
        /// Only documents created or updated after this date
        #[arg(long)]
        since: Option<String>,
    },

    /// Show the parsed settings (token redacted)
    Settings {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::SyncOne { id, format } => {
            let account = cli.account.ok_or("Master account required for sync-one")?;
            commands::sync_one::run(&cli.settings, &account, &id, &format).await?;
        }
        Commands::Resync { since } => {
            let account = cli.account.ok_or("Master account required for resync")?;
            commands::resync::run(&cli.settings, &account, since).await?;
        }
        Commands::Settings { format } => {
            commands::settings::run(&cli.settings, &format)?;
        }
    }

    Ok(())
}

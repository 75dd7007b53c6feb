//! GMP Quest CLI
//!
//! Command-line tools for the offline progress mirror.
//!
//! # Commands
//!
//! - `stats` - Display per-table row counts and journal size
//! - `clear` - Empty every mirrored table (sign-out reset)
//! - `compact` - Rewrite the journal as a snapshot
//! - `pull` / `push` / `sync` - Sync with the hosted backend

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// GMP Quest offline mirror tools.
#[derive(Parser)]
#[command(name = "gmpq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the mirror directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Connection flags shared by the sync commands.
#[derive(Args)]
struct RemoteArgs {
    /// Backend project URL
    #[arg(long, env = "GMPQ_URL")]
    url: String,

    /// Public API key
    #[arg(long, env = "GMPQ_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Session access token of the user to sync
    #[arg(long, env = "GMPQ_ACCESS_TOKEN", hide_env_values = true)]
    token: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-table row counts and journal size
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Empty every mirrored table
    Clear {
        /// Confirm the irreversible local reset
        #[arg(long)]
        yes: bool,
    },

    /// Rewrite the journal as a snapshot of the current rows
    Compact {
        /// Dry run - show the current size only
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Copy the user's remote rows into the mirror
    Pull(RemoteArgs),

    /// Upsert the user's local rows to the backend
    Push(RemoteArgs),

    /// Pull then push, unless nothing changed since a recent sync
    Sync {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Sync even when nothing changed locally
        #[arg(long)]
        force: bool,

        /// Unix time (seconds) of the last successful sync
        #[arg(long)]
        last_sync: Option<u64>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Stats { format } => {
            let path = cli.path.ok_or("Mirror path required for stats")?;
            commands::stats::run(&path, &format)?;
        }
        Commands::Clear { yes } => {
            let path = cli.path.ok_or("Mirror path required for clear")?;
            commands::clear::run(&path, yes)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Mirror path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Pull(remote) => {
            let path = cli.path.ok_or("Mirror path required for pull")?;
            commands::sync::run(&path, &remote.into(), commands::sync::Mode::Pull)?;
        }
        Commands::Push(remote) => {
            let path = cli.path.ok_or("Mirror path required for push")?;
            commands::sync::run(&path, &remote.into(), commands::sync::Mode::Push)?;
        }
        Commands::Sync {
            remote,
            force,
            last_sync,
        } => {
            let path = cli.path.ok_or("Mirror path required for sync")?;
            let mode = commands::sync::Mode::Smart { force, last_sync };
            commands::sync::run(&path, &remote.into(), mode)?;
        }
        Commands::Version => {
            println!("GMP Quest CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

impl From<RemoteArgs> for commands::sync::Connection {
    fn from(args: RemoteArgs) -> Self {
        Self {
            url: args.url,
            api_key: args.api_key,
            token: args.token,
            timeout_secs: args.timeout,
            format: args.format,
        }
    }
}

//! bilisync CLI
//!
//! Command-line surface over a local bilisync store.
//!
//! # Commands
//!
//! - `sync history|favorites` - Run a sync now
//! - `history`, `favorites`, `folders`, `count` - Query the local store
//! - `delete` - Delete a history record, mirrored to the remote if enabled
//! - `backup` - Export, import, upload, download or test history snapshots
//! - `compact` - Rewrite the record log without superseded frames
//! - `status` - Show sync state and store statistics
//! - `daemon` - Run scheduled syncs until interrupted
//!
//! The session is read from `BILISYNC_SESSDATA` and `BILISYNC_BILI_JCT`.

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::{Credentials, WebDavArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Mirror Bilibili watch history and favorites into a local store.
#[derive(Parser)]
#[command(name = "bilisync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long, env = "BILISYNC_PATH", default_value = "bilisync-data")]
    path: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// SESSDATA cookie of the account
    #[arg(global = true, long, env = "BILISYNC_SESSDATA", hide_env_values = true)]
    sessdata: Option<String>,

    /// bili_jct cookie, needed to delete remote history
    #[arg(global = true, long, env = "BILISYNC_BILI_JCT", hide_env_values = true)]
    bili_jct: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync now
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },

    /// List stored history, newest first
    History {
        #[command(flatten)]
        filter: FilterArgs,

        /// Only records with a category (all, archive, pgc, live, article, cheese)
        #[arg(short, long)]
        business: Option<String>,

        /// Only records watched before this Unix time (paging cursor)
        #[arg(short, long)]
        after: Option<i64>,

        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List stored favorites in folder order
    Favorites {
        /// Only resources of this folder
        #[arg(long)]
        folder: Option<u64>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Resume after the resource with this id
        #[arg(short, long)]
        after: Option<u64>,

        /// Maximum number of resources
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List stored favorite folders
    Folders {
        /// Only folders of this account
        #[arg(long)]
        mid: Option<u64>,
    },

    /// Count stored records
    Count {
        /// Count resources of this folder instead of history
        #[arg(long)]
        folder: Option<u64>,
    },

    /// Delete a history record
    Delete {
        /// Id of the record
        id: u64,
    },

    /// Export, import, upload or download history snapshots
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Rewrite the record log without superseded frames
    Compact,

    /// Show sync state and store statistics
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run scheduled syncs until interrupted
    Daemon {
        /// Seconds between scheduler ticks
        #[arg(long, default_value = "60")]
        tick_seconds: u64,

        /// Ticks between history syncs; stored for later runs
        #[arg(long)]
        history_interval: Option<u32>,

        /// Ticks between favorites syncs; stored for later runs
        #[arg(long)]
        favorites_interval: Option<u32>,
    },
}

#[derive(Subcommand)]
enum SyncTarget {
    /// Sync watch history
    History {
        /// Re-read the whole remote history
        #[arg(long)]
        full: bool,
    },
    /// Sync favorite folders and their resources
    Favorites,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Write a history snapshot to a file
    Export {
        /// Output file
        file: PathBuf,
    },
    /// Replace local history with a snapshot file
    Import {
        /// Input file
        file: PathBuf,
    },
    /// Upload a history snapshot to WebDAV
    Upload {
        #[command(flatten)]
        webdav: WebDavArgs,
    },
    /// Replace local history with the WebDAV snapshot
    Download {
        #[command(flatten)]
        webdav: WebDavArgs,
    },
    /// Check the WebDAV location
    Test {
        #[command(flatten)]
        webdav: WebDavArgs,
    },
}

/// Keyword and date filters shared by the query commands.
#[derive(Args)]
pub struct FilterArgs {
    /// Keyword to search for
    #[arg(short, long)]
    keyword: Option<String>,

    /// Fields the keyword is matched against (all, title, author, bvid, id)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// First date to include (YYYY-MM-DD, local time)
    #[arg(long)]
    start: Option<String>,

    /// Last date to include (YYYY-MM-DD, local time)
    #[arg(long)]
    end: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let credentials = Credentials {
        sessdata: cli.sessdata,
        bili_jct: cli.bili_jct,
    };
    let path = cli.path;

    match cli.command {
        Commands::Sync { target } => match target {
            SyncTarget::History { full } => commands::sync::history(&path, credentials, full).await?,
            SyncTarget::Favorites => commands::sync::favorites(&path, credentials).await?,
        },
        Commands::History {
            filter,
            business,
            after,
            limit,
            format,
        } => {
            commands::query::history(&path, &filter, business.as_deref(), after, limit, &format)?;
        }
        Commands::Favorites {
            folder,
            filter,
            after,
            limit,
            format,
        } => commands::query::favorites(&path, folder, &filter, after, limit, &format)?,
        Commands::Folders { mid } => commands::query::folders(&path, mid)?,
        Commands::Count { folder } => commands::query::count(&path, folder)?,
        Commands::Delete { id } => commands::delete::run(&path, credentials, id).await?,
        Commands::Backup { action } => match action {
            BackupAction::Export { file } => commands::backup::export(&path, &file)?,
            BackupAction::Import { file } => commands::backup::import(&path, &file)?,
            BackupAction::Upload { webdav } => commands::backup::upload(&path, &webdav).await?,
            BackupAction::Download { webdav } => commands::backup::download(&path, &webdav).await?,
            BackupAction::Test { webdav } => commands::backup::test(&path, &webdav).await?,
        },
        Commands::Compact => commands::compact::run(&path)?,
        Commands::Status { format } => commands::status::run(&path, &format)?,
        Commands::Daemon {
            tick_seconds,
            history_interval,
            favorites_interval,
        } => {
            let options = commands::daemon::DaemonOptions {
                tick_seconds,
                history_interval,
                favorites_interval,
            };
            commands::daemon::run(&path, credentials, options).await?;
        }
    }

    Ok(())
}

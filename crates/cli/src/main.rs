//! Snapvault CLI - snapvault command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod config;
mod util;

/// Snapvault - Snapshot lifecycle manager for restic repositories
#[derive(Parser)]
#[command(name = "snapvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file (default: search for snapvault.toml upward)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the backup repository and metadata store
    Init,
    /// Create a snapshot now
    Snapshot {
        /// Message recorded with the snapshot
        #[arg(short, long)]
        message: Option<String>,
        /// Tags attached to the snapshot (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
        /// Skip source path validation
        #[arg(long)]
        no_validate: bool,
    },
    /// Show snapshot history
    Log {
        /// Number of snapshots to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Only snapshots by this author
        #[arg(long)]
        author: Option<String>,
        /// Only snapshots carrying all these tags (repeatable)
        #[arg(long)]
        tag: Vec<String>,
    },
    /// Show one snapshot in detail
    Show {
        /// Snapshot ref (id, latest, HEAD, HEAD~N or tag)
        reference: String,
    },
    /// Show file-level differences between two snapshots
    Diff {
        /// First snapshot ref
        ref_a: String,
        /// Second snapshot ref
        ref_b: String,
    },
    /// Restore a snapshot into a directory
    Restore {
        /// Snapshot ref
        reference: String,
        /// Target directory
        target: PathBuf,
        /// Restore only paths matching this pattern (repeatable)
        #[arg(long)]
        path: Vec<String>,
        /// Skip post-restore verification
        #[arg(long)]
        no_verify: bool,
        /// Allow restoring into a non-empty directory
        #[arg(long)]
        overwrite: bool,
    },
    /// Show repository and store status
    Status,
    /// Search snapshots by message, author or tag
    Search {
        /// Substring to look for
        query: String,
        /// Maximum results
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Remove snapshots by ref, or apply the retention policy
    Forget {
        /// Snapshot refs; empty applies the configured retention policy
        refs: Vec<String>,
        /// Report what would be removed without removing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Watch source paths and snapshot automatically
    Watch,
    /// Drop metadata older than a cutoff
    Cleanup {
        /// Age cutoff in days
        #[arg(long, default_value = "365")]
        retain_days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => cmd::init::run(config).await,
        Commands::Snapshot {
            message,
            tag,
            no_validate,
        } => cmd::snapshot::run(config, message, tag, no_validate).await,
        Commands::Log { limit, author, tag } => cmd::log::run(config, limit, author, tag).await,
        Commands::Show { reference } => cmd::show::run(config, &reference).await,
        Commands::Diff { ref_a, ref_b } => cmd::diff::run(config, &ref_a, &ref_b).await,
        Commands::Restore {
            reference,
            target,
            path,
            no_verify,
            overwrite,
        } => cmd::restore::run(config, &reference, &target, path, no_verify, overwrite).await,
        Commands::Status => cmd::status::run(config).await,
        Commands::Search { query, limit } => cmd::search::run(config, &query, limit).await,
        Commands::Forget { refs, dry_run } => cmd::forget::run(config, refs, dry_run).await,
        Commands::Watch => cmd::watch::run(config).await,
        Commands::Cleanup { retain_days } => cmd::cleanup::run(config, retain_days).await,
    }
}

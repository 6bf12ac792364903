//! # Snapchain CLI - Full and incremental backups
//!
//! Command-line front end for the snapchain library.
//!
//! ## Usage
//! ```bash
//! # First backup stores everything
//! snapchain full --source ~/Documents --destination /mnt/backup
//!
//! # Later backups store only new and changed files
//! snapchain incremental --source ~/Documents --destination /mnt/backup \
//!     --excluded-file-list excluded.txt --excluded-path-list excludedpaths.txt
//!
//! # Restore the state of 20 February 2024
//! snapchain restore --destination /mnt/backup --restore-to ~/restore \
//!     --restore-date 2024-02-20-00-00-00
//!
//! # Find every invoice ever backed up
//! snapchain search --destination /mnt/backup --search-text invoice --write-search-to ~/reports
//! ```
//!
//! Exit code is 0 on success and 1 on any error.

use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use snapchain::config::{load_name_list, parse_argument_date, require_dir, require_file};
use snapchain::snapshot::LOG_FILE_DATE_FORMAT;
use snapchain::utils::format_bytes;
use snapchain::{
    BackupConfig, FolderNameMapping, RestoreRequest, Result, SearchQuery, Snapchain, SnapchainBuilder,
    SnapchainError, SnapshotKind,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Snapchain CLI - full and incremental backups with point-in-time restore
#[derive(Parser)]
#[command(name = "snapchain")]
#[command(version)]
#[command(about = "Full and incremental backups with point-in-time restore and history search")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write log lines to a timestamped file in this folder
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every file of the source into a new Full snapshot
    Full(BackupArgs),

    /// Back up new and changed files into a new Incremental snapshot
    Incremental(BackupArgs),

    /// Restore the backed-up tree as of a date
    Restore {
        /// Folder holding the snapshots
        #[arg(long)]
        destination: PathBuf,

        /// Folder to restore into
        #[arg(long)]
        restore_to: PathBuf,

        /// Restore the state at this date (yyyy-MM-dd-HH-mm-ss), latest when omitted
        #[arg(long)]
        restore_date: Option<String>,

        /// Restore only this folder of the backup
        #[arg(long)]
        subfolder: Option<PathBuf>,

        /// Replace files that already exist in the restore folder
        #[arg(long)]
        overwrite: bool,

        /// File with `local name=stored name` lines for top-level folders
        #[arg(long)]
        folder_name_mapping: Option<PathBuf>,

        /// Show a spinner while restoring
        #[arg(long)]
        progress: bool,
    },

    /// Search all snapshots in a date range for names matching a regular expression
    Search {
        /// Folder holding the snapshots
        #[arg(long)]
        destination: PathBuf,

        /// Regular expression matched against file and folder names
        #[arg(long)]
        search_text: String,

        /// Folder the CSV report is written to
        #[arg(long)]
        write_search_to: PathBuf,

        /// Oldest snapshot date to search (yyyy-MM-dd-HH-mm-ss), epoch when omitted
        #[arg(long)]
        start_date: Option<String>,

        /// Newest snapshot date to search (yyyy-MM-dd-HH-mm-ss), now when omitted
        #[arg(long)]
        end_date: Option<String>,
    },
}

#[derive(Args)]
struct BackupArgs {
    /// Folder to back up
    #[arg(long)]
    source: PathBuf,

    /// Folder holding the snapshots
    #[arg(long)]
    destination: PathBuf,

    /// File with one file name to skip per line
    #[arg(long)]
    excluded_file_list: Option<PathBuf>,

    /// File with one path marker per line; folders whose path contains one are skipped
    #[arg(long)]
    excluded_path_list: Option<PathBuf>,

    /// File with `local name=stored name` lines for top-level folders
    #[arg(long)]
    folder_name_mapping: Option<PathBuf>,

    /// Show a spinner while backing up
    #[arg(long)]
    progress: bool,
}

fn main() {
    let cli = Cli::parse();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = init_logging(cli.verbose, cli.log_dir.as_deref()) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }

    // Run command
    if let Err(e) = run(cli.command) {
        tracing::error!("{}", e);
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Console logging to stderr, plus an optional plain-text log file
fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_dir {
        Some(dir) => {
            require_dir(dir, "Log folder")?;
            let name = format!("snapchain-{}.log", Local::now().format(LOG_FILE_DATE_FORMAT));
            let file = File::create(dir.join(name))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Main command runner
fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Full(args) => cmd_backup(args, SnapshotKind::Full),
        Commands::Incremental(args) => cmd_backup(args, SnapshotKind::Incremental),
        Commands::Restore {
            destination,
            restore_to,
            restore_date,
            subfolder,
            overwrite,
            folder_name_mapping,
            progress,
        } => cmd_restore(
            destination,
            restore_to,
            restore_date,
            subfolder,
            overwrite,
            folder_name_mapping,
            progress,
        ),
        Commands::Search {
            destination,
            search_text,
            write_search_to,
            start_date,
            end_date,
        } => cmd_search(destination, search_text, write_search_to, start_date, end_date),
    }
}

/// Load the optional mapping file
fn load_mapping(path: Option<&Path>) -> Result<FolderNameMapping> {
    match path {
        Some(path) => {
            require_file(path, "Folder name mapping file")?;
            FolderNameMapping::load(path)
        }
        None => Ok(FolderNameMapping::new()),
    }
}

/// Load an optional list file
fn load_list(path: Option<&Path>, what: &str) -> Result<Vec<String>> {
    match path {
        Some(path) => {
            require_file(path, what)?;
            load_name_list(path)
        }
        None => Ok(Vec::new()),
    }
}

fn spinner(enabled: bool, message: &'static str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Create a Full or Incremental snapshot
fn cmd_backup(args: BackupArgs, kind: SnapshotKind) -> Result<()> {
    require_dir(&args.source, "Source folder")?;
    require_dir(&args.destination, "Destination folder")?;

    let config = BackupConfig {
        excluded_files: load_list(args.excluded_file_list.as_deref(), "Excluded file list")?,
        excluded_paths: load_list(args.excluded_path_list.as_deref(), "Excluded path list")?,
        folder_name_mapping: load_mapping(args.folder_name_mapping.as_deref())?,
        overwrite: false,
    };
    let chain = SnapchainBuilder::new().config(config).build(args.destination)?;

    println!(
        "{} {}",
        format!("Creating {} backup of", kind.as_str().to_lowercase()).blue().bold(),
        args.source.display()
    );

    let progress = spinner(args.progress, "Scanning and copying files...");
    let result = chain.backup(&args.source, kind);
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let result = result?;

    println!("{} Created snapshot {}", "✓".green().bold(), result.label.yellow().bold());
    if let Some(previous) = &result.previous {
        println!("  Based on: {}", previous.cyan());
    }
    println!("  Files in backup: {}", result.file_count.to_string().cyan());
    println!("  Files copied: {}", result.stats.files_copied.to_string().cyan());
    println!("  Bytes copied: {}", format_bytes(result.stats.bytes_copied).cyan());
    if kind == SnapshotKind::Incremental {
        println!(
            "  Entries added/updated/removed: {}/{}/{}",
            result.stats.entries_added.to_string().green(),
            result.stats.entries_updated.to_string().yellow(),
            result.stats.entries_pruned.to_string().red()
        );
    }
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(result.duration_ms)).to_string().cyan()
    );

    Ok(())
}

/// Restore the backed-up tree
fn cmd_restore(
    destination: PathBuf,
    restore_to: PathBuf,
    restore_date: Option<String>,
    subfolder: Option<PathBuf>,
    overwrite: bool,
    folder_name_mapping: Option<PathBuf>,
    show_progress: bool,
) -> Result<()> {
    require_dir(&destination, "Destination folder")?;
    require_dir(&restore_to, "Restore folder")?;
    let instant = restore_date.as_deref().map(parse_argument_date).transpose()?;

    let chain = SnapchainBuilder::new()
        .folder_name_mapping(load_mapping(folder_name_mapping.as_deref())?)
        .overwrite(overwrite)
        .build(destination)?;

    println!("{} {}", "Restoring into".blue().bold(), restore_to.display());

    let progress = spinner(show_progress, "Restoring files...");
    let result = chain.restore(&RestoreRequest {
        target: restore_to.clone(),
        instant,
        subfolder,
    });
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let result = result?;

    println!("{} Restored from snapshot {}", "✓".green().bold(), result.snapshot.yellow().bold());
    println!("  Folders created: {}", result.folders_created.to_string().cyan());
    println!("  Files restored: {}", result.files_restored.to_string().cyan());
    println!("  Bytes written: {}", format_bytes(result.bytes_written).cyan());
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(result.duration_ms)).to_string().cyan()
    );

    if result.files_recovered > 0 {
        println!(
            "  Recovered from other snapshots: {}",
            result.files_recovered.to_string().yellow()
        );
    }
    if !result.unrecoverable.is_empty() {
        println!("\n{}", "Files missing from every snapshot:".yellow().bold());
        for path in &result.unrecoverable {
            println!("  - {}", path.display().to_string().yellow());
        }
    }

    println!("Restore finished, see {}", restore_to.display());
    Ok(())
}

/// Search snapshot history
fn cmd_search(
    destination: PathBuf,
    search_text: String,
    write_search_to: PathBuf,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<()> {
    require_dir(&destination, "Destination folder")?;
    require_dir(&write_search_to, "Search report folder")?;

    let start = match start_date.as_deref() {
        Some(value) => parse_argument_date(value)?,
        None => NaiveDateTime::default(),
    };
    let end = match end_date.as_deref() {
        Some(value) => parse_argument_date(value)?,
        None => Local::now().naive_local(),
    };
    if start > end {
        return Err(SnapchainError::config("start date is after end date"));
    }

    let chain = Snapchain::open(destination)?;
    let query = SearchQuery {
        pattern: search_text,
        start,
        end,
    };
    let (report, path) = chain.search_to_dir(&query, &write_search_to)?;

    println!(
        "{} {} matching items in {} snapshots",
        "✓".green().bold(),
        report.hits.len().to_string().cyan(),
        report.snapshots_scanned.to_string().cyan()
    );
    println!("  Report: {}", path.display().to_string().yellow());

    Ok(())
}

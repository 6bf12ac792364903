//! # Snapchain - Full and incremental backups with point-in-time restore
//!
//! A backup library that keeps a chain of full and incremental snapshots of a
//! directory tree, restores the tree as it was at any instant, and searches
//! the whole history for files and folders by name.
//!
//! ## Overview
//!
//! Snapchain detects changes by file modification time, not by content. Every
//! snapshot directory stores:
//! - the **manifest** (`folderlist.json`): the complete logical tree of the
//!   source at that run, and for every file the snapshot directory holding
//!   its bytes
//! - only the files copied during that run: everything for a Full snapshot,
//!   new and changed files for an Incremental one
//!
//! A restore therefore replays one manifest and pulls each file from whatever
//! snapshot its entry points at.
//!
//! ## Architecture
//!
//! - **Scanner**: walks the live source into a manifest tree, applying
//!   exclusion rules
//! - **Backup chain**: enumerates snapshot directories by name; lexical order
//!   of names is chronological order
//! - **Sync engine**: merges the scanned tree into the previous manifest and
//!   copies exactly the files no earlier snapshot holds
//! - **Restorer**: replays a manifest, falling back to other snapshots when a
//!   file's recorded snapshot lost it
//! - **Search engine**: scans manifests over a date range for name matches
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapchain::{RestoreRequest, Snapchain, SnapshotKind};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = Snapchain::open(PathBuf::from("/backups"))?;
//!
//! // First run stores everything
//! chain.backup(Path::new("/home/user/documents"), SnapshotKind::Full)?;
//!
//! // Later runs store only what changed
//! let result = chain.backup(Path::new("/home/user/documents"), SnapshotKind::Incremental)?;
//! println!("{} files copied", result.stats.files_copied);
//!
//! // Rebuild the latest state somewhere else
//! let restored = chain.restore(&RestoreRequest {
//!     target: PathBuf::from("/tmp/restore"),
//!     ..Default::default()
//! })?;
//! println!("Restored {} files", restored.files_restored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Searching History
//!
//! ```rust,no_run
//! use snapchain::{SearchQuery, Snapchain};
//! use snapchain::snapshot::parse_argument_date;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = Snapchain::open(PathBuf::from("/backups"))?;
//! let report = chain.search(&SearchQuery {
//!     pattern: "invoice".to_string(),
//!     start: parse_argument_date("2024-01-01-00-00-00")?,
//!     end: parse_argument_date("2024-12-31-23-59-59")?,
//! })?;
//! for hit in &report.hits {
//!     println!("{:?} last seen in {}", hit.path, hit.found_in);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Sticky top-level folders
//!
//! Folders directly under the source root are never dropped from the manifest
//! because a scan did not see them; an unmounted drive or a lagging sync client
//! must not erase history. Deeper content is pruned normally.
//!
//! ### Folder-name mapping
//!
//! Sync clients can name the same top-level library differently per machine.
//! A mapping table stores such folders under one name and restores them under
//! the local one.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, SnapchainError>`. The library never exits
//! the process; the `snapchain` binary turns any error into exit code 1.
//!
//! ## Module Organization
//!
//! - [`types`]: Manifest tree and result types
//! - [`snapshot`]: Snapshot labels and date formats
//! - [`manifest`]: Manifest persistence
//! - [`chain`]: Backup chain locator
//! - [`scanner`]: Filesystem scanner and exclusion rules
//! - [`fsops`]: Filesystem primitives
//! - [`sync`]: Diff & sync engine
//! - [`mapping`]: Folder-name mapping
//! - [`restore`]: Point-in-time restore
//! - [`search`]: Historical search and CSV report
//! - [`config`]: Run configuration and loaders
//! - [`error`]: Error types and handling

// Public API modules
pub mod chain;
pub mod config;
pub mod error;
pub mod fsops;
pub mod manifest;
pub mod mapping;
pub mod restore;
pub mod scanner;
pub mod search;
pub mod snapchain;
pub mod snapshot;
pub mod sync;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use chain::BackupChain;
pub use config::BackupConfig;
pub use error::{Result, SnapchainError};
pub use fsops::{FsOps, LocalFs};
pub use mapping::FolderNameMapping;
pub use search::{SearchHit, SearchQuery, SearchReport};
pub use snapchain::{Snapchain, SnapchainBuilder};
pub use snapshot::{SnapshotKind, SnapshotLabel};
pub use types::*;

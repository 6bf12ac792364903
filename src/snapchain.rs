//! Main snapchain implementation
//!
//! [`Snapchain`] ties the components together for the three run types:
//!
//! - **backup**: scan the source, locate the previous snapshot, merge and copy
//!   into a new snapshot directory, persist the manifest
//! - **restore**: locate the snapshot for an instant and replay its manifest
//! - **search**: scan the manifests of a date range for matching names
//!
//! Every fatal condition comes back as an error; nothing here exits the
//! process.

use crate::chain::BackupChain;
use crate::config::{require_dir, BackupConfig};
use crate::error::{Result, SnapchainError};
use crate::fsops::{FsOps, LocalFs};
use crate::manifest::{load_manifest, store_manifest};
use crate::mapping::FolderNameMapping;
use crate::restore::Restorer;
use crate::scanner::Scanner;
use crate::search::{SearchEngine, SearchQuery, SearchReport};
use crate::snapshot::{SnapshotKind, SnapshotLabel};
use crate::sync::SyncEngine;
use crate::types::{BackupResult, RestoreRequest, RestoreResult};
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Backup, restore and search over one backup root
///
/// # Example
///
/// ```rust,no_run
/// use snapchain::{SnapchainBuilder, SnapshotKind};
/// use std::path::{Path, PathBuf};
///
/// # fn main() -> snapchain::Result<()> {
/// let chain = SnapchainBuilder::new()
///     .excluded_files(vec![".DS_Store".to_string()])
///     .build(PathBuf::from("/backups"))?;
///
/// let result = chain.backup(Path::new("/home/user/documents"), SnapshotKind::Full)?;
/// println!("Wrote {} ({} files)", result.label, result.file_count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Snapchain {
    /// Directory holding the snapshot directories
    backup_root: PathBuf,
    /// Run configuration
    config: BackupConfig,
    /// Filesystem primitives
    fs: Arc<dyn FsOps>,
}

impl Snapchain {
    /// Open a backup root with default configuration
    ///
    /// # Errors
    ///
    /// Returns [`SnapchainError::InvalidConfiguration`] if the root is not an
    /// existing directory.
    pub fn open(backup_root: PathBuf) -> Result<Self> {
        SnapchainBuilder::new().build(backup_root)
    }

    /// Backup root directory
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Active configuration
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Enumerate the snapshots currently in the backup root
    pub fn chain(&self) -> Result<BackupChain> {
        BackupChain::open(self.fs.as_ref(), &self.backup_root)
    }

    /// Back up `source` into a new snapshot labelled with the current local time
    pub fn backup(&self, source: &Path, kind: SnapshotKind) -> Result<BackupResult> {
        self.backup_at(source, kind, Local::now().naive_local())
    }

    /// Back up `source` into a new snapshot labelled with `timestamp`
    ///
    /// The previous snapshot is located, the source scanned and the previous
    /// manifest loaded before the snapshot directory is created, so a failing
    /// precondition leaves the backup root untouched.
    ///
    /// # Errors
    ///
    /// - [`SnapchainError::NoPreviousBackup`] for an incremental run on an empty root
    /// - [`SnapchainError::InvalidConfiguration`] when `timestamp` is not newer
    ///   than the latest snapshot
    /// - [`SnapchainError::SnapshotExists`] when the snapshot directory exists
    /// - any scan, copy or manifest error
    #[instrument(skip(self), fields(root = ?self.backup_root))]
    pub fn backup_at(&self, source: &Path, kind: SnapshotKind, timestamp: NaiveDateTime) -> Result<BackupResult> {
        let start = Instant::now();
        require_dir(source, "Source folder")?;

        let chain = self.chain()?;
        let label = SnapshotLabel::new(timestamp, kind);
        info!("Starting {} backup {}", kind.as_str().to_lowercase(), label);

        let latest = chain.most_recent();
        if let Some(latest) = latest {
            if label.timestamp() <= latest.timestamp() {
                return Err(SnapchainError::config(format!(
                    "New snapshot {} is not newer than the latest snapshot {}",
                    label, latest
                )));
            }
        }

        let previous = match kind {
            SnapshotKind::Full => None,
            SnapshotKind::Incremental => {
                let latest =
                    latest.ok_or_else(|| SnapchainError::NoPreviousBackup(self.backup_root.clone()))?;
                info!("Previous backup is {}", latest);
                Some(latest.clone())
            }
        };

        let snapshot_dir = chain.snapshot_dir(&label);
        if self.fs.exists(&snapshot_dir) {
            return Err(SnapchainError::SnapshotExists(snapshot_dir));
        }

        let rules = self.config.exclusion_rules();
        let mut source_tree = Scanner::new(self.fs.as_ref(), &rules).scan(source, label.as_str())?;
        source_tree.name.clear();

        let previous_manifest = match &previous {
            Some(prev) => {
                let mut manifest = load_manifest(&chain.snapshot_dir(prev))?;
                manifest.name.clear();
                Some(manifest)
            }
            None => None,
        };

        self.fs.create_dir_all(&snapshot_dir)?;
        debug!("Created snapshot directory {:?}", snapshot_dir);

        let mut engine = SyncEngine::new(
            self.fs.as_ref(),
            source,
            &snapshot_dir,
            label.as_str(),
            &self.config.folder_name_mapping,
        );
        let manifest = match previous_manifest {
            Some(mut manifest) => {
                engine.merge(&source_tree, &mut manifest)?;
                manifest
            }
            None => engine.materialize(&source_tree)?,
        };

        store_manifest(&snapshot_dir, &manifest)?;
        let stats = engine.into_stats();

        let result = BackupResult {
            label: label.to_string(),
            previous: previous.map(|p| p.to_string()),
            snapshot_dir,
            file_count: manifest.file_count(),
            stats,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Backup {} done: {} files copied, {} files in manifest, {}ms",
            result.label, result.stats.files_copied, result.file_count, result.duration_ms
        );
        Ok(result)
    }

    /// Restore the backed-up tree as of `request.instant` into `request.target`
    #[instrument(skip(self), fields(root = ?self.backup_root))]
    pub fn restore(&self, request: &RestoreRequest) -> Result<RestoreResult> {
        let chain = self.chain()?;
        Restorer::new(
            self.fs.as_ref(),
            &chain,
            &self.config.folder_name_mapping,
            self.config.overwrite,
        )
        .restore(request)
    }

    /// Search the manifests of the snapshots in the query's date range
    #[instrument(skip(self), fields(root = ?self.backup_root))]
    pub fn search(&self, query: &SearchQuery) -> Result<SearchReport> {
        let chain = self.chain()?;
        SearchEngine::new(&chain).search(query)
    }

    /// Run a search and write its CSV report into `report_dir`
    pub fn search_to_dir(&self, query: &SearchQuery, report_dir: &Path) -> Result<(SearchReport, PathBuf)> {
        require_dir(report_dir, "Search report folder")?;
        let report = self.search(query)?;
        let path = report.write_to_dir(self.fs.as_ref(), report_dir)?;
        Ok((report, path))
    }
}

/// Builder for configuring a [`Snapchain`]
///
/// # Example
///
/// ```rust,no_run
/// use snapchain::{FolderNameMapping, SnapchainBuilder};
/// use std::path::PathBuf;
///
/// # fn main() -> snapchain::Result<()> {
/// let chain = SnapchainBuilder::new()
///     .excluded_paths(vec!["node_modules".to_string()])
///     .folder_name_mapping(FolderNameMapping::from_pairs([("OneDrive - Home", "OneDrive")]))
///     .overwrite(true)
///     .build(PathBuf::from("/backups"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapchainBuilder {
    config: BackupConfig,
    fs: Option<Arc<dyn FsOps>>,
}

impl SnapchainBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: BackupConfig) -> Self {
        self.config = config;
        self
    }

    /// File names skipped wherever they appear
    pub fn excluded_files(mut self, names: Vec<String>) -> Self {
        self.config.excluded_files = names;
        self
    }

    /// Path markers; directories whose path contains one are skipped
    pub fn excluded_paths(mut self, markers: Vec<String>) -> Self {
        self.config.excluded_paths = markers;
        self
    }

    /// Depth-1 folder rename table
    pub fn folder_name_mapping(mut self, mapping: FolderNameMapping) -> Self {
        self.config.folder_name_mapping = mapping;
        self
    }

    /// Replace existing files when restoring
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.config.overwrite = overwrite;
        self
    }

    /// Use custom filesystem primitives instead of the local disk
    pub fn fs(mut self, fs: Arc<dyn FsOps>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Build the instance for `backup_root`, which must be an existing directory
    pub fn build(self, backup_root: PathBuf) -> Result<Snapchain> {
        require_dir(&backup_root, "Backup folder")?;
        Ok(Snapchain {
            backup_root,
            config: self.config,
            fs: self.fs.unwrap_or_else(|| Arc::new(LocalFs::new())),
        })
    }
}

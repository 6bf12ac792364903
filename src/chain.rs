//! Backup chain locator
//!
//! Enumerates the snapshot directories directly under a backup root and
//! answers the chronological queries the backup, restore and search runs
//! need. Directories that do not follow the snapshot naming convention are
//! ignored, so unrelated folders may live next to the snapshots. A snapshot
//! directory without a manifest is left over from an interrupted run; it is
//! reported with a warning and never part of the chain.
//!
//! ## Example
//!
//! ```rust,no_run
//! use snapchain::chain::BackupChain;
//! use snapchain::fsops::LocalFs;
//! use std::path::Path;
//!
//! # fn example() -> snapchain::Result<()> {
//! let chain = BackupChain::open(&LocalFs, Path::new("/backups"))?;
//! if let Some(latest) = chain.most_recent() {
//!     println!("latest snapshot: {}", latest);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::fsops::FsOps;
use crate::manifest::manifest_path;
use crate::snapshot::SnapshotLabel;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// The ordered set of snapshots found under a backup root
#[derive(Debug, Clone)]
pub struct BackupChain {
    root: PathBuf,
    /// Sorted ascending, oldest first
    labels: Vec<SnapshotLabel>,
    /// Snapshot directories without a manifest, oldest first
    incomplete: Vec<SnapshotLabel>,
}

impl BackupChain {
    /// Enumerate the snapshots under `root`
    ///
    /// An unreadable root is an error; a root without snapshots yields an
    /// empty chain.
    pub fn open(fs: &dyn FsOps, root: &Path) -> Result<Self> {
        let mut labels = Vec::new();
        let mut incomplete = Vec::new();
        for child in fs.list_children(root)? {
            if !child.is_dir {
                continue;
            }
            match SnapshotLabel::parse(&child.name) {
                Ok(label) if fs.is_file(&manifest_path(&child.path)) => labels.push(label),
                Ok(label) => {
                    warn!(
                        "Skipping incomplete snapshot {:?}: no manifest, remove it once investigated",
                        child.path
                    );
                    incomplete.push(label);
                }
                Err(_) => trace!("Ignoring non-snapshot directory {:?}", child.name),
            }
        }
        labels.sort();
        incomplete.sort();

        debug!("Found {} snapshots in {:?}", labels.len(), root);
        Ok(Self {
            root: root.to_path_buf(),
            labels,
            incomplete,
        })
    }

    /// Backup root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All snapshots, oldest first
    pub fn labels(&self) -> &[SnapshotLabel] {
        &self.labels
    }

    /// Snapshot directories skipped for lacking a manifest, oldest first
    pub fn incomplete(&self) -> &[SnapshotLabel] {
        &self.incomplete
    }

    /// Whether the root holds no snapshot
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of snapshots
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether a snapshot with this label exists
    pub fn contains(&self, label: &SnapshotLabel) -> bool {
        self.labels.binary_search(label).is_ok()
    }

    /// Chronologically latest snapshot
    pub fn most_recent(&self) -> Option<&SnapshotLabel> {
        self.labels.last()
    }

    /// Latest snapshot whose timestamp is at or before `instant`
    pub fn most_recent_at_or_before(&self, instant: NaiveDateTime) -> Option<&SnapshotLabel> {
        self.labels.iter().rev().find(|l| l.timestamp() <= instant)
    }

    /// All snapshots strictly older than `label`, oldest first
    pub fn older_than(&self, label: &SnapshotLabel) -> Vec<&SnapshotLabel> {
        self.labels.iter().filter(|l| *l < label).collect()
    }

    /// Snapshots with a timestamp in `[start, end]`, newest first
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&SnapshotLabel> {
        self.labels
            .iter()
            .rev()
            .filter(|l| l.timestamp() >= start && l.timestamp() <= end)
            .collect()
    }

    /// Absolute path of a snapshot directory
    pub fn snapshot_dir(&self, label: &SnapshotLabel) -> PathBuf {
        self.root.join(label.as_str())
    }
}

//! Point-in-time restore
//!
//! Rebuilds, under a target directory, the backed-up tree as it was at a
//! requested instant (or at the latest snapshot). The manifest of the chosen
//! snapshot is replayed: folders are created and every file is copied from
//! the snapshot its entry points at, which is usually older than the snapshot
//! being replayed.
//!
//! ## Missing bytes
//!
//! When a file's recorded snapshot no longer holds it (manual deletion,
//! partial copy), other snapshots not newer than the restore target are
//! searched for the same relative path: first those newer than the recorded
//! one, nearest first, then the older ones, nearest first. A hit is copied and
//! logged as a substitution. A file found nowhere is logged, listed in
//! [`RestoreResult::unrecoverable`], and the rest of the tree is still restored.
//!
//! ## Folder-name mapping
//!
//! The manifest holds mapped depth-1 folder names. The first component of
//! every destination path is translated back to the local name.

use crate::chain::BackupChain;
use crate::error::{Result, SnapchainError};
use crate::fsops::FsOps;
use crate::manifest::load_manifest;
use crate::mapping::FolderNameMapping;
use crate::snapshot::{SnapshotLabel, OUTPUT_DATE_FORMAT};
use crate::types::{Entry, FileEntry, FolderEntry, RestoreRequest, RestoreResult};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Replays snapshot manifests into a target directory
#[derive(Debug)]
pub struct Restorer<'a> {
    fs: &'a dyn FsOps,
    chain: &'a BackupChain,
    mapping: &'a FolderNameMapping,
    overwrite: bool,
}

/// State of a single restore run
struct RestoreRun<'r> {
    target_dir: &'r Path,
    snapshot: &'r SnapshotLabel,
    result: RestoreResult,
}

impl<'a> Restorer<'a> {
    /// Create a restorer over a backup chain
    pub fn new(fs: &'a dyn FsOps, chain: &'a BackupChain, mapping: &'a FolderNameMapping, overwrite: bool) -> Self {
        Self {
            fs,
            chain,
            mapping,
            overwrite,
        }
    }

    /// Restore according to `request`
    ///
    /// Fails before writing anything when no snapshot qualifies, the manifest
    /// is unreadable or the subfolder cannot be resolved. Fails mid-way when a
    /// destination file exists and overwrite is off.
    #[instrument(skip(self), fields(target = ?request.target))]
    pub fn restore(&self, request: &RestoreRequest) -> Result<RestoreResult> {
        let start = Instant::now();

        let snapshot = self.resolve_snapshot(request)?;
        info!("Restoring from snapshot {}", snapshot);

        let manifest = load_manifest(&self.chain.snapshot_dir(snapshot))?;

        let subfolder = request
            .subfolder
            .as_deref()
            .map(normalize_subfolder)
            .unwrap_or_default();
        let start_folder = descend(&manifest, &subfolder)?;

        let mut run = RestoreRun {
            target_dir: &request.target,
            snapshot,
            result: RestoreResult {
                snapshot: snapshot.to_string(),
                ..Default::default()
            },
        };

        self.fs.create_dir_all(&run.target_dir.join(self.destination_rel(&subfolder)))?;
        self.restore_folder(&mut run, start_folder, &subfolder)?;

        let mut result = run.result;
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Restored {} files ({} recovered from other snapshots, {} unrecoverable) in {}ms",
            result.files_restored,
            result.files_recovered,
            result.unrecoverable.len(),
            result.duration_ms
        );
        Ok(result)
    }

    fn resolve_snapshot(&self, request: &RestoreRequest) -> Result<&'a SnapshotLabel> {
        match request.instant {
            Some(instant) => self.chain.most_recent_at_or_before(instant).ok_or_else(|| {
                SnapchainError::NoSnapshotBefore(instant.format(OUTPUT_DATE_FORMAT).to_string())
            }),
            None => self
                .chain
                .most_recent()
                .ok_or_else(|| SnapchainError::NoPreviousBackup(self.chain.root().to_path_buf())),
        }
    }

    fn restore_folder(&self, run: &mut RestoreRun<'_>, folder: &FolderEntry, manifest_rel: &Path) -> Result<()> {
        for child in &folder.children {
            let rel = manifest_rel.join(child.name());
            match child {
                Entry::Folder(sub) => {
                    self.fs.create_dir_all(&run.target_dir.join(self.destination_rel(&rel)))?;
                    run.result.folders_created += 1;
                    self.restore_folder(run, sub, &rel)?;
                }
                Entry::File(file) => self.restore_file(run, file, &rel)?,
            }
        }
        Ok(())
    }

    fn restore_file(&self, run: &mut RestoreRun<'_>, file: &FileEntry, rel: &Path) -> Result<()> {
        let destination = run.target_dir.join(self.destination_rel(rel));
        if !self.overwrite && self.fs.exists(&destination) {
            return Err(SnapchainError::DestinationExists(destination));
        }

        let recorded = self.chain.root().join(&file.snapshot_label).join(rel);
        let source = if self.fs.is_file(&recorded) {
            recorded
        } else {
            match self.find_fallback(file, rel, run.snapshot) {
                Some(label) => {
                    warn!(
                        "{:?} is missing from snapshot {}, restoring it from snapshot {}",
                        rel, file.snapshot_label, label
                    );
                    run.result.files_recovered += 1;
                    self.chain.snapshot_dir(label).join(rel)
                }
                None => {
                    warn!(
                        "{:?} is missing from snapshot {} and no other snapshot holds it, skipping",
                        rel, file.snapshot_label
                    );
                    run.result.unrecoverable.push(rel.to_path_buf());
                    return Ok(());
                }
            }
        };

        let bytes = self.fs.copy_file(&source, &destination, self.overwrite)?;
        run.result.files_restored += 1;
        run.result.bytes_written += bytes;
        Ok(())
    }

    /// First snapshot, other than the recorded one, holding `rel`
    fn find_fallback(&self, file: &FileEntry, rel: &Path, target: &SnapshotLabel) -> Option<&'a SnapshotLabel> {
        fallback_order(self.chain.labels(), &file.snapshot_label, target)
            .into_iter()
            .find(|label| self.fs.is_file(&self.chain.snapshot_dir(label).join(rel)))
    }

    /// Destination path of a manifest path, first component translated back
    /// to its local name
    fn destination_rel(&self, manifest_rel: &Path) -> PathBuf {
        let mut components = manifest_rel.components();
        let mut out = PathBuf::new();
        if let Some(first) = components.next() {
            let first = first.as_os_str().to_string_lossy();
            out.push(self.mapping.reverse(&first));
        }
        out.extend(components);
        out
    }
}

/// Fallback search order for a file recorded in `recorded`
///
/// Only snapshots at or before `target` qualify. Newer-than-recorded
/// snapshots come first, ascending, then older ones, descending.
pub fn fallback_order<'l>(labels: &'l [SnapshotLabel], recorded: &str, target: &SnapshotLabel) -> Vec<&'l SnapshotLabel> {
    let eligible = labels.iter().filter(|l| *l <= target && l.as_str() != recorded);

    let (newer, older): (Vec<_>, Vec<_>) = eligible.partition(|l| l.as_str() > recorded);
    newer.into_iter().chain(older.into_iter().rev()).collect()
}

/// Keep only the normal components of a requested subfolder
fn normalize_subfolder(subfolder: &Path) -> PathBuf {
    subfolder
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Walk the manifest down a subfolder path using exact folder names
fn descend<'m>(root: &'m FolderEntry, subfolder: &Path) -> Result<&'m FolderEntry> {
    let mut current = root;
    for component in subfolder.components() {
        let name = component.as_os_str().to_string_lossy();
        match current.child(&name) {
            Some(Entry::Folder(folder)) => current = folder,
            Some(Entry::File(_)) => return Err(SnapchainError::SubfolderIsFile(subfolder.to_path_buf())),
            None => return Err(SnapchainError::SubfolderNotFound(subfolder.to_path_buf())),
        }
    }
    debug!("Restore starts at manifest folder {:?}", subfolder);
    Ok(current)
}

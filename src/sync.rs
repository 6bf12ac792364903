//! Diff & sync engine
//!
//! Merges a freshly scanned source tree into the previous manifest, turning it
//! into the manifest of the snapshot being written, and copies into that
//! snapshot's directory exactly the files whose bytes no earlier snapshot
//! holds.
//!
//! ## Merge rules
//!
//! For every child of a source folder, the previous folder is searched for a
//! child with the identical (case-sensitive) name:
//!
//! - **new file**: appended with the current label, bytes copied
//! - **new folder**: appended whole with the current label, every file beneath
//!   it copied and every folder created, whatever the file ages
//! - **matched file**: when the source modification time is strictly newer,
//!   timestamp and label move to the current snapshot and the bytes are
//!   copied; otherwise the entry keeps pointing at its older snapshot
//! - **matched folder**: merged recursively one level deeper
//! - **file paired with folder**: [`SnapchainError::KindMismatch`]
//!
//! Previous children absent from the source are pruned, except at level 1:
//! top-level folders survive a scan that does not see them (unmounted drives,
//! sync clients catching up). Their content below level 1 is pruned normally
//! once they are scanned again.
//!
//! At level 1 source folder names go through the [`FolderNameMapping`];
//! matching, insertion and the copy destination all use the mapped name. The
//! source tree is only read.
//!
//! A Full backup is the same merge against an empty root, see
//! [`SyncEngine::materialize`].

use crate::error::{Result, SnapchainError};
use crate::fsops::FsOps;
use crate::mapping::FolderNameMapping;
use crate::types::{Entry, FileEntry, FolderEntry, SyncStats};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, trace};

/// Applies one backup run's merge and copies
#[derive(Debug)]
pub struct SyncEngine<'a> {
    fs: &'a dyn FsOps,
    source_root: &'a Path,
    snapshot_dir: &'a Path,
    label: &'a str,
    mapping: &'a FolderNameMapping,
    stats: SyncStats,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine copying from `source_root` into `snapshot_dir`,
    /// labelling new and changed entries with `label`
    pub fn new(
        fs: &'a dyn FsOps,
        source_root: &'a Path,
        snapshot_dir: &'a Path,
        label: &'a str,
        mapping: &'a FolderNameMapping,
    ) -> Self {
        Self {
            fs,
            source_root,
            snapshot_dir,
            label,
            mapping,
            stats: SyncStats::default(),
        }
    }

    /// Merge `source` into `previous`, which becomes the new manifest
    #[instrument(skip_all, fields(label = %self.label))]
    pub fn merge(&mut self, source: &FolderEntry, previous: &mut FolderEntry) -> Result<()> {
        self.merge_folder(source, previous, Path::new(""), Path::new(""), 1)?;
        debug!(
            "Merge done: {} added, {} updated, {} pruned, {} files copied",
            self.stats.entries_added,
            self.stats.entries_updated,
            self.stats.entries_pruned,
            self.stats.files_copied
        );
        Ok(())
    }

    /// Build a Full manifest from `source`, copying every file
    pub fn materialize(&mut self, source: &FolderEntry) -> Result<FolderEntry> {
        let mut root = FolderEntry::new("", self.label);
        self.merge(source, &mut root)?;
        Ok(root)
    }

    /// Counters collected so far
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Consume the engine, returning its counters
    pub fn into_stats(self) -> SyncStats {
        self.stats
    }

    fn merge_folder(
        &mut self,
        source: &FolderEntry,
        previous: &mut FolderEntry,
        source_rel: &Path,
        stored_rel: &Path,
        level: usize,
    ) -> Result<()> {
        let mapping = self.mapping;
        for child in &source.children {
            let stored_name = match child {
                Entry::Folder(_) if level == 1 => mapping.map(child.name()),
                _ => child.name(),
            };
            let child_source_rel = source_rel.join(child.name());
            let child_stored_rel = stored_rel.join(stored_name);

            let position = previous.children.iter().position(|c| c.name() == stored_name);
            let Some(index) = position else {
                let added = self.add_new(child, stored_name, &child_source_rel, &child_stored_rel)?;
                previous.push(added);
                self.stats.entries_added += 1;
                continue;
            };

            match (child, &mut previous.children[index]) {
                (Entry::File(src), Entry::File(prev)) => {
                    if src.last_modified_millis > prev.last_modified_millis {
                        self.copy_file(&child_source_rel, &child_stored_rel)?;
                        prev.last_modified_millis = src.last_modified_millis;
                        prev.snapshot_label = self.label.to_string();
                        self.stats.entries_updated += 1;
                    }
                }
                (Entry::Folder(src), Entry::Folder(prev)) => {
                    self.merge_folder(src, prev, &child_source_rel, &child_stored_rel, level + 1)?;
                }
                _ => return Err(SnapchainError::KindMismatch(child_stored_rel)),
            }
        }

        if level > 1 {
            let before = previous.children.len();
            previous
                .children
                .retain(|prev| source.children.iter().any(|src| src.name() == prev.name()));
            let pruned = before - previous.children.len();
            if pruned > 0 {
                trace!("Pruned {} entries under {:?}", pruned, stored_rel);
                self.stats.entries_pruned += pruned;
            }
        }

        Ok(())
    }

    /// Copy a new item into the snapshot and return its manifest entry
    fn add_new(
        &mut self,
        child: &Entry,
        stored_name: &str,
        source_rel: &Path,
        stored_rel: &Path,
    ) -> Result<Entry> {
        match child {
            Entry::File(src) => {
                self.copy_file(source_rel, stored_rel)?;
                Ok(Entry::File(FileEntry::new(stored_name, src.last_modified_millis, self.label)))
            }
            Entry::Folder(src) => {
                let folder = self.materialize_folder(src, stored_name, source_rel, stored_rel)?;
                Ok(Entry::Folder(folder))
            }
        }
    }

    fn materialize_folder(
        &mut self,
        source: &FolderEntry,
        stored_name: &str,
        source_rel: &Path,
        stored_rel: &Path,
    ) -> Result<FolderEntry> {
        self.fs.create_dir_all(&self.snapshot_dir.join(stored_rel))?;
        self.stats.folders_created += 1;

        let mut folder = FolderEntry::new(stored_name, self.label);
        for child in &source.children {
            let name = child.name();
            let added = self.add_new(child, name, &source_rel.join(name), &stored_rel.join(name))?;
            folder.push(added);
        }
        Ok(folder)
    }

    fn copy_file(&mut self, source_rel: &Path, stored_rel: &Path) -> Result<()> {
        let from = self.source_root.join(source_rel);
        let to: PathBuf = self.snapshot_dir.join(stored_rel);
        if let Some(parent) = to.parent() {
            self.fs.create_dir_all(parent)?;
        }

        let bytes = self.fs.copy_file(&from, &to, true)?;
        self.stats.files_copied += 1;
        self.stats.bytes_copied += bytes;
        trace!("Stored {:?}", stored_rel);
        Ok(())
    }
}

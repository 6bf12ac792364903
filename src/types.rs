//! Core data types used throughout the snapchain library
//!
//! This module contains the manifest tree and the result types shared across
//! the scanner, sync engine, restorer and search engine.
//!
//! ## Overview
//!
//! - **Manifest tree**: [`Entry`], [`FileEntry`], [`FolderEntry`] describe the full
//!   logical file/folder state of a snapshot, and for every file the snapshot
//!   directory that holds its authoritative bytes.
//! - **Operation results**: [`SyncStats`], [`BackupResult`], [`RestoreResult`].
//! - **Requests**: [`RestoreRequest`].
//!
//! ## Serialization
//!
//! The tree serializes to the `folderlist.json` schema: every node carries a `type`
//! discriminator (`afile` / `afolder`), the snapshot label is stored as
//! `pathToBackup`, file timestamps as `ts` and folder children as `fileOrFolderList`.
//!
//! ```rust
//! use snapchain::types::{Entry, FileEntry, FolderEntry};
//!
//! let mut root = FolderEntry::new("", "2024-01-01 00;00;00 (Full)");
//! root.push(Entry::File(FileEntry::new("a.txt", 100, "2024-01-01 00;00;00 (Full)")));
//!
//! let json = serde_json::to_string(&Entry::Folder(root)).unwrap();
//! assert!(json.contains("\"type\":\"afolder\""));
//! assert!(json.contains("\"ts\":100"));
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A node of the manifest tree
///
/// Tagged union of a file and a folder. The tag is serialized as a plain
/// `type` string field so a generic deserializer can rebuild the union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entry {
    /// A regular file
    #[serde(rename = "afile")]
    File(FileEntry),
    /// A folder with ordered children
    #[serde(rename = "afolder")]
    Folder(FolderEntry),
}

/// Kind of a manifest node, used by search results and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Folder
    Folder,
}

impl EntryKind {
    /// Lower-case label used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
        }
    }
}

/// A file captured in a manifest
///
/// `snapshot_label` names the snapshot directory holding the authoritative copy
/// of this file's bytes, which may be older than the snapshot owning the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name (last path component)
    pub name: String,
    /// Snapshot directory containing the file's bytes
    #[serde(rename = "pathToBackup")]
    pub snapshot_label: String,
    /// Source modification time at last capture, epoch milliseconds
    #[serde(rename = "ts")]
    pub last_modified_millis: i64,
}

/// A folder captured in a manifest
///
/// The snapshot label is carried for schema uniformity only; folders have no bytes.
/// Child names are unique within `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Folder name (last path component); empty for a manifest root
    pub name: String,
    /// Unused for folders
    #[serde(rename = "pathToBackup", default)]
    pub snapshot_label: String,
    /// Ordered children
    #[serde(rename = "fileOrFolderList", default)]
    pub children: Vec<Entry>,
}

impl Entry {
    /// Name of the node
    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => &f.name,
            Entry::Folder(f) => &f.name,
        }
    }

    /// Snapshot label of the node
    pub fn snapshot_label(&self) -> &str {
        match self {
            Entry::File(f) => &f.snapshot_label,
            Entry::Folder(f) => &f.snapshot_label,
        }
    }

    /// Kind of the node
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::File(_) => EntryKind::File,
            Entry::Folder(_) => EntryKind::Folder,
        }
    }

    /// Borrow as a folder, if it is one
    pub fn as_folder(&self) -> Option<&FolderEntry> {
        match self {
            Entry::Folder(f) => Some(f),
            Entry::File(_) => None,
        }
    }
}

impl FileEntry {
    /// Create a file entry
    pub fn new(name: impl Into<String>, last_modified_millis: i64, snapshot_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot_label: snapshot_label.into(),
            last_modified_millis,
        }
    }
}

impl FolderEntry {
    /// Create an empty folder entry
    pub fn new(name: impl Into<String>, snapshot_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot_label: snapshot_label.into(),
            children: Vec::new(),
        }
    }

    /// Append a child
    pub fn push(&mut self, entry: Entry) {
        self.children.push(entry);
    }

    /// Find a direct child by exact name
    pub fn child(&self, name: &str) -> Option<&Entry> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Number of files anywhere below this folder
    pub fn file_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                Entry::File(_) => 1,
                Entry::Folder(f) => f.file_count(),
            })
            .sum()
    }

    /// Visit every file below this folder with its path relative to this folder
    pub fn files(&self) -> Vec<(PathBuf, &FileEntry)> {
        let mut out = Vec::new();
        self.collect_files(PathBuf::new(), &mut out);
        out
    }

    fn collect_files<'a>(&'a self, base: PathBuf, out: &mut Vec<(PathBuf, &'a FileEntry)>) {
        for child in &self.children {
            match child {
                Entry::File(f) => out.push((base.join(&f.name), f)),
                Entry::Folder(f) => f.collect_files(base.join(&f.name), out),
            }
        }
    }
}

/// Counters collected while materializing or merging a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Files physically copied into the new snapshot
    pub files_copied: usize,
    /// Bytes physically copied into the new snapshot
    pub bytes_copied: u64,
    /// Directories created in the new snapshot
    pub folders_created: usize,
    /// Manifest entries added (new files or folders)
    pub entries_added: usize,
    /// File entries whose timestamp and label moved to the new snapshot
    pub entries_updated: usize,
    /// Manifest entries removed because they vanished from the source
    pub entries_pruned: usize,
}

/// Result of a backup run
#[derive(Debug, Clone)]
pub struct BackupResult {
    /// Label of the snapshot that was written
    pub label: String,
    /// Snapshot the incremental run was based on
    pub previous: Option<String>,
    /// Absolute path of the snapshot directory
    pub snapshot_dir: PathBuf,
    /// Files described by the persisted manifest
    pub file_count: usize,
    /// Copy and merge counters
    pub stats: SyncStats,
    /// Run duration in milliseconds
    pub duration_ms: u64,
}

/// Parameters of a restore run
#[derive(Debug, Clone, Default)]
pub struct RestoreRequest {
    /// Directory the tree is reconstructed under
    pub target: PathBuf,
    /// Restore the state as of this local instant; latest when `None`
    pub instant: Option<NaiveDateTime>,
    /// Restore only this folder of the manifest (manifest names, `/`-separated)
    pub subfolder: Option<PathBuf>,
}

/// Result of a restore run
#[derive(Debug, Clone, Default)]
pub struct RestoreResult {
    /// Snapshot whose manifest was replayed
    pub snapshot: String,
    /// Folders created under the target
    pub folders_created: usize,
    /// Files copied under the target
    pub files_restored: usize,
    /// Files whose bytes came from a different snapshot than recorded
    pub files_recovered: usize,
    /// Bytes written
    pub bytes_written: u64,
    /// Manifest paths whose bytes could not be found anywhere
    pub unrecoverable: Vec<PathBuf>,
    /// Run duration in milliseconds
    pub duration_ms: u64,
}

//! Manifest persistence
//!
//! Every snapshot directory holds `folderlist.json`, the serialized manifest
//! tree of the whole logical source as of that run. Next to it an informational
//! `folderlist-withfullpaths.json` is written, where each node carries its path
//! from the manifest root and files carry a readable modification date. Only
//! `folderlist.json` is ever read back.

use crate::error::{Result, SnapchainError};
use crate::snapshot::format_millis;
use crate::types::{Entry, FolderEntry};
use crate::utils::atomic_write;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the manifest inside a snapshot directory
pub const MANIFEST_FILE_NAME: &str = "folderlist.json";

/// File name of the full-path companion manifest
pub const FULL_PATH_MANIFEST_FILE_NAME: &str = "folderlist-withfullpaths.json";

/// Path of the manifest of a snapshot directory
pub fn manifest_path(snapshot_dir: &Path) -> PathBuf {
    snapshot_dir.join(MANIFEST_FILE_NAME)
}

/// Load the manifest of a snapshot directory
///
/// The manifest root must be a folder; anything else is reported as
/// [`SnapchainError::ManifestCorrupted`], as is JSON that does not match the
/// tree schema. A snapshot directory without a manifest is
/// [`SnapchainError::SnapshotNotFound`].
pub fn load_manifest(snapshot_dir: &Path) -> Result<FolderEntry> {
    let path = manifest_path(snapshot_dir);
    if !path.is_file() {
        return Err(SnapchainError::SnapshotNotFound(snapshot_dir.to_path_buf()));
    }
    let json = fs::read_to_string(&path)?;

    let entry: Entry =
        serde_json::from_str(&json).map_err(|e| SnapchainError::corrupted(&path, e.to_string()))?;

    match entry {
        Entry::Folder(root) => {
            debug!("Loaded manifest {:?} ({} files)", path, root.file_count());
            Ok(root)
        }
        Entry::File(_) => Err(SnapchainError::corrupted(&path, "root is not a folder")),
    }
}

/// Store the manifest and its full-path companion in a snapshot directory
pub fn store_manifest(snapshot_dir: &Path, root: &FolderEntry) -> Result<()> {
    let manifest = Entry::Folder(root.clone());
    let bytes = serde_json::to_vec(&manifest)?;
    atomic_write(&manifest_path(snapshot_dir), &bytes)?;

    let companion = FullPathNode::from_folder(root, PathBuf::new());
    let companion_bytes = serde_json::to_vec_pretty(&companion)?;
    atomic_write(&snapshot_dir.join(FULL_PATH_MANIFEST_FILE_NAME), &companion_bytes)?;

    debug!(
        "Stored manifest in {:?} ({} files, {} bytes)",
        snapshot_dir,
        root.file_count(),
        bytes.len()
    );
    Ok(())
}

/// Node of the full-path companion manifest
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum FullPathNode<'a> {
    #[serde(rename = "afile")]
    File {
        name: String,
        #[serde(rename = "pathToBackup")]
        snapshot_label: &'a str,
        lastmodified: String,
    },
    #[serde(rename = "afolder")]
    Folder {
        name: String,
        #[serde(rename = "pathToBackup")]
        snapshot_label: &'a str,
        #[serde(rename = "fileOrFolderList")]
        children: Vec<FullPathNode<'a>>,
    },
}

impl<'a> FullPathNode<'a> {
    fn from_folder(folder: &'a FolderEntry, path: PathBuf) -> Self {
        let children = folder
            .children
            .iter()
            .map(|child| {
                let child_path = path.join(child.name());
                match child {
                    Entry::File(f) => FullPathNode::File {
                        name: display_path(&child_path),
                        snapshot_label: &f.snapshot_label,
                        lastmodified: format_millis(f.last_modified_millis),
                    },
                    Entry::Folder(sub) => FullPathNode::from_folder(sub, child_path),
                }
            })
            .collect();

        FullPathNode::Folder {
            name: display_path(&path),
            snapshot_label: &folder.snapshot_label,
            children,
        }
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

//! Filesystem scanner
//!
//! Walks a live source directory and produces a manifest tree of its current
//! state, labelled with the snapshot being created. Children are sorted by
//! name so two scans of an unchanged directory yield identical trees.
//!
//! Exclusion rules:
//! - a file is skipped when its name exactly matches an excluded file name,
//!   or when it is a hidden GUID file (`.` followed by a `8-4-4-4-12` hex token,
//!   e.g. `.849C9593-D756-4E56-8D6E-42412F2A707B`)
//! - a directory is skipped, and not descended into, when its full path
//!   contains any excluded path marker, compared case-insensitively

use crate::error::Result;
use crate::fsops::FsOps;
use crate::types::{Entry, FileEntry, FolderEntry};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, instrument, trace};

/// File and directory exclusion rules applied while scanning
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    excluded_files: HashSet<String>,
    /// Lower-cased, trimmed, non-empty
    excluded_paths: Vec<String>,
}

impl ExclusionRules {
    /// Build rules from exact file names and path substrings
    pub fn new(excluded_files: &[String], excluded_paths: &[String]) -> Self {
        Self {
            excluded_files: excluded_files.iter().cloned().collect(),
            excluded_paths: excluded_paths
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether a file with this name is left out of the manifest
    pub fn skips_file(&self, name: &str) -> bool {
        self.excluded_files.contains(name) || is_hidden_guid_file(name)
    }

    /// Whether a directory at this path is left out of the manifest
    pub fn skips_dir(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }
        let lowered = path.to_string_lossy().to_lowercase();
        self.excluded_paths.iter().any(|marker| lowered.contains(marker.as_str()))
    }
}

/// Whether `name` is a hidden GUID file such as `.849C9593-D756-4E56-8D6E-42412F2A707B`
pub fn is_hidden_guid_file(name: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    let Some(token) = name.strip_prefix('.') else {
        return false;
    };
    if token.len() != 36 {
        return false;
    }

    let groups: Vec<&str> = token.split('-').collect();
    groups.len() == GROUPS.len()
        && groups
            .iter()
            .zip(GROUPS)
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Builds manifest trees from live directories
#[derive(Debug)]
pub struct Scanner<'a> {
    fs: &'a dyn FsOps,
    rules: &'a ExclusionRules,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over the given filesystem
    pub fn new(fs: &'a dyn FsOps, rules: &'a ExclusionRules) -> Self {
        Self { fs, rules }
    }

    /// Scan `dir` into a folder entry named after it, labelling every node with `label`
    ///
    /// Any unreadable directory aborts the scan.
    #[instrument(skip(self), fields(dir = ?dir))]
    pub fn scan(&self, dir: &Path, label: &str) -> Result<FolderEntry> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tree = self.scan_folder(dir, name, label)?;
        debug!("Scanned {:?}: {} files", dir, tree.file_count());
        Ok(tree)
    }

    fn scan_folder(&self, dir: &Path, name: String, label: &str) -> Result<FolderEntry> {
        let mut folder = FolderEntry::new(name, label);

        for child in self.fs.list_children(dir)? {
            if child.is_dir {
                if self.rules.skips_dir(&child.path) {
                    trace!("Excluded directory {:?}", child.path);
                    continue;
                }
                let sub = self.scan_folder(&child.path, child.name, label)?;
                folder.push(Entry::Folder(sub));
            } else {
                if self.rules.skips_file(&child.name) {
                    trace!("Excluded file {:?}", child.path);
                    continue;
                }
                folder.push(Entry::File(FileEntry::new(child.name, child.modified_millis, label)));
            }
        }

        Ok(folder)
    }
}

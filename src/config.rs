//! Run configuration
//!
//! [`BackupConfig`] is built once, at process start or through
//! [`SnapchainBuilder`](crate::SnapchainBuilder), and handed by reference to
//! every component. Nothing is read from global state.
//!
//! The loaders read the plain-text files the binary accepts: one excluded name
//! or path marker per line, and `local name=stored name` folder mappings.

use crate::error::{Result, SnapchainError};
use crate::mapping::FolderNameMapping;
use crate::scanner::ExclusionRules;
use std::fs;
use std::path::Path;
use tracing::debug;

pub use crate::snapshot::parse_argument_date;

/// Settings shared by backup, restore and search runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupConfig {
    /// File names skipped wherever they appear (exact match)
    pub excluded_files: Vec<String>,
    /// Directories whose full path contains one of these are skipped (case-insensitive)
    pub excluded_paths: Vec<String>,
    /// Depth-1 folder rename table
    pub folder_name_mapping: FolderNameMapping,
    /// Replace existing files when restoring
    pub overwrite: bool,
}

impl BackupConfig {
    /// Scanner exclusion rules for this configuration
    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::new(&self.excluded_files, &self.excluded_paths)
    }
}

/// Load a list file: one entry per line, trimmed, blank lines ignored
pub fn load_name_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let names: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    debug!("Loaded {} entries from {:?}", names.len(), path);
    Ok(names)
}

/// Fail unless `path` is an existing directory
pub fn require_dir(path: &Path, what: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(SnapchainError::config(format!(
            "{} {:?} does not exist or is not a directory",
            what, path
        )));
    }
    Ok(())
}

/// Fail unless `path` is an existing regular file
pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(SnapchainError::config(format!(
            "{} {:?} does not exist or is not a file",
            what, path
        )));
    }
    Ok(())
}

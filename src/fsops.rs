//! Raw filesystem capability
//!
//! The scanner, sync engine and restorer never touch `std::fs` directly for
//! listing, copying or creating directories. They go through [`FsOps`], which
//! keeps the core algorithms testable against instrumented implementations
//! (e.g. one that counts copies) and leaves room for non-local storage.
//!
//! [`LocalFs`] is the implementation used by the binary.

use crate::error::{Result, SnapchainError};
use crate::utils::{os_str_to_string, system_time_to_millis};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

/// An immediate child of a listed directory
///
/// Symbolic links are described by their target: a link to a directory is a
/// directory and a link to a file carries the target's modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirChild {
    /// File or folder name
    pub name: String,
    /// Absolute path
    pub path: PathBuf,
    /// Whether the child is a directory
    pub is_dir: bool,
    /// Modification time, epoch milliseconds
    pub modified_millis: i64,
}

/// Filesystem primitives the core is written against
///
/// Implementations must be `Send + Sync` so an orchestrator can be shared
/// behind an `Arc`.
pub trait FsOps: Send + Sync + fmt::Debug {
    /// List the immediate children of `dir`, sorted by name
    fn list_children(&self, dir: &Path) -> Result<Vec<DirChild>>;

    /// Copy one file preserving its modification time, returning bytes copied
    ///
    /// Fails with [`SnapchainError::DestinationExists`] when `to` exists and
    /// `overwrite` is false.
    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64>;

    /// Create a directory and all missing parents
    fn create_dir_all(&self, dir: &Path) -> Result<()>;

    /// Whether a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Whether a path exists and is a regular file
    fn is_file(&self, path: &Path) -> bool;
}

/// Local disk implementation of [`FsOps`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create a local filesystem handle
    pub fn new() -> Self {
        Self
    }
}

/// Whether the directory `link` resolves to contains `dir`
fn links_to_ancestor(link: &Path, dir: &Path) -> Result<bool> {
    let target = fs::canonicalize(link)?;
    let dir = fs::canonicalize(dir)?;
    Ok(dir.starts_with(target))
}

impl FsOps for LocalFs {
    fn list_children(&self, dir: &Path) -> Result<Vec<DirChild>> {
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        let mut children = Vec::new();
        for entry in walker {
            let entry = entry?;
            let metadata = if entry.path_is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!("Skipping dangling symlink {:?}", entry.path());
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                entry.metadata()?
            };

            if metadata.is_dir() && entry.path_is_symlink() && links_to_ancestor(entry.path(), dir)? {
                warn!("Skipping symlink {:?}: it points at one of its own parents", entry.path());
                continue;
            }

            children.push(DirChild {
                name: os_str_to_string(entry.file_name())?,
                path: entry.path().to_path_buf(),
                is_dir: metadata.is_dir(),
                modified_millis: system_time_to_millis(metadata.modified()?),
            });
        }

        trace!("Listed {} children of {:?}", children.len(), dir);
        Ok(children)
    }

    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64> {
        if !overwrite && to.exists() {
            return Err(SnapchainError::DestinationExists(to.to_path_buf()));
        }

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = fs::copy(from, to)?;

        let metadata = fs::metadata(from)?;
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        filetime::set_file_mtime(to, mtime)?;

        trace!("Copied {:?} -> {:?} ({} bytes)", from, to, bytes);
        Ok(bytes)
    }

    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

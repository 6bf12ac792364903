//! Error types for the snapchain library
//!
//! This module defines all error types that can occur during backup, restore
//! and search runs. Every fatal condition is reported as a [`SnapchainError`]
//! and travels up to the caller; the library never terminates the process.
//!
//! The variants fall into the categories the binary reports on:
//! - **Configuration errors**: bad arguments, missing previous backup, unknown subfolder
//! - **Filesystem errors**: I/O failures while scanning, copying or creating directories
//! - **Integrity errors**: unreadable manifests or manifests violating the tree schema
//! - **Restore conflicts**: destination files that already exist without overwrite

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the snapchain library
pub type Result<T> = std::result::Result<T, SnapchainError>;

/// Main error type for all snapchain operations
#[derive(Debug, Error)]
pub enum SnapchainError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during manifest serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Invalid configuration or arguments
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Incremental backup requested without any previous snapshot
    #[error("No previous backup found in {0:?}")]
    NoPreviousBackup(PathBuf),

    /// No snapshot exists at or before the requested instant
    #[error("No snapshot found at or before {0}")]
    NoSnapshotBefore(String),

    /// Snapshot directory has no manifest (interrupted run or manual deletion)
    #[error("Snapshot not found or incomplete: {0:?}")]
    SnapshotNotFound(PathBuf),

    /// Directory name does not follow the snapshot naming convention
    #[error("Invalid snapshot label: {0}")]
    InvalidSnapshotLabel(String),

    /// Snapshot directory for a new run already exists
    #[error("Snapshot directory already exists: {0:?}")]
    SnapshotExists(PathBuf),

    /// Manifest is unreadable or violates the tree schema
    #[error("Manifest corrupted at {path:?}: {reason}")]
    ManifestCorrupted {
        /// Manifest file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// A file and a folder with the same name were paired during a merge
    #[error("Kind mismatch for {0:?}: a file and a folder share this path")]
    KindMismatch(PathBuf),

    /// Requested restore subfolder is not in the manifest
    #[error("Subfolder not found in backup: {0:?}")]
    SubfolderNotFound(PathBuf),

    /// Requested restore subfolder resolves to a file
    #[error("Subfolder is a file, not a folder: {0:?}")]
    SubfolderIsFile(PathBuf),

    /// Restore target already exists and overwrite was not requested
    #[error("Destination already exists: {0:?}")]
    DestinationExists(PathBuf),

    /// Search pattern is not a valid regular expression
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Path conversion error
    #[error("Path conversion error: {0:?}")]
    PathConversion(std::ffi::OsString),
}

impl SnapchainError {
    /// Create a configuration error with a custom message
    pub fn config(msg: impl Into<String>) -> Self {
        SnapchainError::InvalidConfiguration(msg.into())
    }

    /// Create a manifest corruption error
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SnapchainError::ManifestCorrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error was caused by user input rather than the backup set
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SnapchainError::InvalidConfiguration(_)
                | SnapchainError::NoPreviousBackup(_)
                | SnapchainError::NoSnapshotBefore(_)
                | SnapchainError::SubfolderNotFound(_)
                | SnapchainError::SubfolderIsFile(_)
                | SnapchainError::DestinationExists(_)
                | SnapchainError::InvalidPattern(_)
        )
    }

    /// Check if this error indicates a damaged backup set
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SnapchainError::ManifestCorrupted { .. }
                | SnapchainError::SnapshotNotFound(_)
                | SnapchainError::Json(_)
                | SnapchainError::KindMismatch(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            SnapchainError::NoPreviousBackup(path) => {
                format!(
                    "You're asking for an incremental backup but there is no previous backup in {:?}. \
                     Start with a full backup or check the destination folder.",
                    path
                )
            }
            SnapchainError::DestinationExists(path) => {
                format!(
                    "The file {:?} already exists in the restore folder. \
                     Rerun with --overwrite to replace existing files.",
                    path
                )
            }
            SnapchainError::SubfolderNotFound(path) => {
                format!("You specified {:?} as subfolder to restore, but it does not exist in the backup.", path)
            }
            SnapchainError::SubfolderIsFile(path) => {
                format!("You specified {:?} as subfolder to restore, but it is a file, not a folder.", path)
            }
            SnapchainError::SnapshotNotFound(path) => {
                format!(
                    "Snapshot {:?} has no manifest; it was left by an interrupted run. \
                     Remove that folder and rerun.",
                    path
                )
            }
            SnapchainError::SnapshotExists(path) => {
                format!("Snapshot directory {:?} already exists. Wait a second and rerun.", path)
            }
            _ => self.to_string(),
        }
    }
}

//! Utility functions for snapchain
//!
//! Small helpers shared by the scanner, sync engine, restorer and CLI:
//!
//! - Atomic file writing (manifests and reports are never left half-written)
//! - Epoch-millisecond conversion of file modification times
//! - Path to string conversion for manifest names
//! - Human-readable byte formatting
//!
//! ```rust
//! use snapchain::utils::format_bytes;
//!
//! assert_eq!(format_bytes(512), "512 B");
//! assert_eq!(format_bytes(1536), "1.50 KB");
//! ```

use crate::error::{Result, SnapchainError};
use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

/// Atomic file write (write to temp file then rename)
///
/// The temporary file is created next to `path` so the final rename never
/// crosses a filesystem boundary. The target is either the old content or the
/// complete new content, never a partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| SnapchainError::Io(e.error))?;

    Ok(())
}

/// Convert a modification time to epoch milliseconds
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp_millis()
}

/// Convert an OS string (file name) to a UTF-8 manifest name
pub fn os_str_to_string(name: &OsStr) -> Result<String> {
    name.to_str()
        .map(str::to_string)
        .ok_or_else(|| SnapchainError::PathConversion(name.to_os_string()))
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

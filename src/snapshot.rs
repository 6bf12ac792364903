//! Snapshot identity and naming
//!
//! A snapshot is a directory under the backup root named
//! `yyyy-MM-dd HH;mm;ss (Full)` or `yyyy-MM-dd HH;mm;ss (Incremental)`. The
//! timestamp layout makes lexical order equal chronological order, which the
//! chain locator, restorer and search engine all rely on.
//!
//! ```rust
//! use snapchain::snapshot::{SnapshotKind, SnapshotLabel};
//!
//! let label = SnapshotLabel::parse("2024-01-01 00;00;00 (Full)").unwrap();
//! assert_eq!(label.kind(), SnapshotKind::Full);
//! assert_eq!(label.as_str(), "2024-01-01 00;00;00 (Full)");
//! assert!(SnapshotLabel::parse("2024-01-01 (Full)").is_err());
//! ```

use crate::error::{Result, SnapchainError};
use chrono::{Local, NaiveDateTime, SubsecRound, TimeZone};
use std::cmp::Ordering;
use std::fmt;

/// Timestamp layout of snapshot directory names
pub const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d %H;%M;%S";

/// Timestamp layout of date arguments (`yyyy-MM-dd-HH-mm-ss`)
pub const ARGUMENT_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Timestamp layout for humans (`yyyy MM dd HH:mm:ss`)
pub const OUTPUT_DATE_FORMAT: &str = "%Y %m %d %H:%M:%S";

/// Timestamp layout used in log file names
pub const LOG_FILE_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Full or incremental snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SnapshotKind {
    /// Manifest built from scratch, every file stored
    Full,
    /// Manifest diffed against the previous one, only new or changed files stored
    Incremental,
}

impl SnapshotKind {
    /// Suffix used in the directory name, without parentheses
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Full => "Full",
            SnapshotKind::Incremental => "Incremental",
        }
    }
}

/// Name of a snapshot directory
///
/// Ordering and equality follow the directory name, so sorting labels sorts
/// snapshots chronologically.
#[derive(Debug, Clone)]
pub struct SnapshotLabel {
    name: String,
    timestamp: NaiveDateTime,
    kind: SnapshotKind,
}

impl SnapshotLabel {
    /// Create a label for a snapshot taken at `timestamp` (sub-seconds dropped)
    pub fn new(timestamp: NaiveDateTime, kind: SnapshotKind) -> Self {
        let timestamp = timestamp.trunc_subsecs(0);
        let name = format!("{} ({})", timestamp.format(SNAPSHOT_DATE_FORMAT), kind.as_str());
        Self { name, timestamp, kind }
    }

    /// Create a label for a snapshot taken now, in local time
    pub fn now(kind: SnapshotKind) -> Self {
        Self::new(Local::now().naive_local(), kind)
    }

    /// Parse a directory name, rejecting anything off the naming convention
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || SnapchainError::InvalidSnapshotLabel(name.to_string());

        let (stamp, kind) = if let Some(stamp) = name.strip_suffix(" (Full)") {
            (stamp, SnapshotKind::Full)
        } else if let Some(stamp) = name.strip_suffix(" (Incremental)") {
            (stamp, SnapshotKind::Incremental)
        } else {
            return Err(invalid());
        };

        let timestamp = NaiveDateTime::parse_from_str(stamp, SNAPSHOT_DATE_FORMAT).map_err(|_| invalid())?;
        let label = Self::new(timestamp, kind);

        // chrono accepts unpadded fields; the name must round-trip exactly
        if label.name != name {
            return Err(invalid());
        }
        Ok(label)
    }

    /// Directory name
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Embedded timestamp (local time)
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Full or incremental
    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }
}

impl PartialEq for SnapshotLabel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for SnapshotLabel {}

impl PartialOrd for SnapshotLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SnapshotLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for SnapshotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Parse a `yyyy-MM-dd-HH-mm-ss` date argument (local time)
pub fn parse_argument_date(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), ARGUMENT_DATE_FORMAT).map_err(|_| {
        SnapchainError::config(format!(
            "'{}' has a wrong date format, expected yyyy-MM-dd-HH-mm-ss",
            value
        ))
    })
}

/// Format an epoch-millisecond timestamp for humans, in local time
pub fn format_millis(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format(OUTPUT_DATE_FORMAT).to_string(),
        None => millis.to_string(),
    }
}

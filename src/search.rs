//! Historical search
//!
//! Scans the manifests of every snapshot in a date range for files and
//! folders whose name matches a regular expression, and reports for each
//! distinct path the most recent snapshot in which it was seen.
//!
//! Snapshots are visited newest first and a `(path, kind)` pair is recorded
//! only once, so the retained snapshot is always the newest one holding a
//! match at that path, even when the item was deleted later.
//!
//! ## Report
//!
//! The CSV report starts with a `sep=,` line (so spreadsheet tools pick the
//! separator regardless of locale), then a header and one row per hit:
//!
//! | column | content |
//! |---|---|
//! | name of matching item | last path component |
//! | type | `file` or `folder` |
//! | backup folder where found last | newest snapshot whose manifest lists the item |
//! | path to backup folder holding latest version | absolute path of the snapshot holding the bytes |
//! | folder within backup | parent folder for files (empty at the root), own path for folders |

use crate::chain::BackupChain;
use crate::error::{Result, SnapchainError};
use crate::fsops::FsOps;
use crate::manifest::load_manifest;
use crate::types::{Entry, EntryKind, FolderEntry};
use crate::utils::atomic_write;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Name of the report file; alternatives are numbered `searchresults (N).csv`
pub const REPORT_FILE_STEM: &str = "searchresults";

/// Highest number tried for an alternative report file name
pub const MAX_REPORT_FILE_ATTEMPTS: usize = 1000;

const CSV_HEADER: &str = "name of matching item,type,backup folder where found last,\
path to backup folder holding latest version,folder within backup";

/// What to search for
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Regular expression matched anywhere in item names
    pub pattern: String,
    /// Oldest snapshot timestamp to include
    pub start: NaiveDateTime,
    /// Newest snapshot timestamp to include
    pub end: NaiveDateTime,
}

/// One distinct matching path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Path from the manifest root, including the item name
    pub path: PathBuf,
    /// File or folder
    pub kind: EntryKind,
    /// Newest snapshot whose manifest lists the item
    pub found_in: String,
    /// Snapshot holding the item's bytes (same as `found_in` for folders)
    pub stored_in: String,
}

impl SearchHit {
    /// Last path component
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Folder column of the report
    pub fn folder(&self) -> PathBuf {
        match self.kind {
            EntryKind::File => self.path.parent().map(Path::to_path_buf).unwrap_or_default(),
            EntryKind::Folder => self.path.clone(),
        }
    }
}

/// Result of a search run
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// Backup root the snapshots live in
    pub backup_root: PathBuf,
    /// Hits sorted by path, files before folders on equal paths
    pub hits: Vec<SearchHit>,
    /// Number of manifests scanned
    pub snapshots_scanned: usize,
    /// Run duration in milliseconds
    pub duration_ms: u64,
}

impl SearchReport {
    /// Render the CSV report
    pub fn to_csv(&self) -> String {
        let mut out = String::from("sep=,\n");
        out.push_str(CSV_HEADER);
        out.push('\n');

        for hit in &self.hits {
            let stored_path = self.backup_root.join(&hit.stored_in);
            let fields = [
                hit.name(),
                hit.kind.as_str().to_string(),
                hit.found_in.clone(),
                stored_path.to_string_lossy().into_owned(),
                hit.folder().to_string_lossy().into_owned(),
            ];
            let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }

    /// Write the report into `dir` under the first free report name
    pub fn write_to_dir(&self, fs: &dyn FsOps, dir: &Path) -> Result<PathBuf> {
        let path = next_report_path(fs, dir)?;
        atomic_write(&path, self.to_csv().as_bytes())?;
        info!("Search results written to {:?}", path);
        Ok(path)
    }
}

/// Quote a CSV field when it contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// First free report path in `dir`: `searchresults.csv`, then
/// `searchresults (1).csv` up to `searchresults (1000).csv`
pub fn next_report_path(fs: &dyn FsOps, dir: &Path) -> Result<PathBuf> {
    let first = dir.join(format!("{}.csv", REPORT_FILE_STEM));
    if !fs.exists(&first) {
        return Ok(first);
    }

    (1..=MAX_REPORT_FILE_ATTEMPTS)
        .map(|n| dir.join(format!("{} ({}).csv", REPORT_FILE_STEM, n)))
        .find(|p| !fs.exists(p))
        .ok_or_else(|| {
            SnapchainError::config(format!(
                "No free report file name in {:?}, remove old search results",
                dir
            ))
        })
}

/// Searches manifests across a backup chain
#[derive(Debug)]
pub struct SearchEngine<'a> {
    chain: &'a BackupChain,
}

impl<'a> SearchEngine<'a> {
    /// Create a search engine over a backup chain
    pub fn new(chain: &'a BackupChain) -> Self {
        Self { chain }
    }

    /// Run a search
    #[instrument(skip(self), fields(pattern = %query.pattern))]
    pub fn search(&self, query: &SearchQuery) -> Result<SearchReport> {
        let start = Instant::now();
        let pattern = Regex::new(&query.pattern)?;

        let snapshots = self.chain.between(query.start, query.end);
        info!("Searching {} snapshots", snapshots.len());

        let mut found: BTreeMap<(PathBuf, EntryKind), (String, String)> = BTreeMap::new();
        for label in &snapshots {
            let manifest = load_manifest(&self.chain.snapshot_dir(label))?;
            let before = found.len();
            collect_matches(&manifest, Path::new(""), &pattern, label.as_str(), &mut found);
            debug!("{}: {} new matches", label, found.len() - before);
        }

        let hits = found
            .into_iter()
            .map(|((path, kind), (found_in, stored_in))| SearchHit {
                path,
                kind,
                found_in,
                stored_in,
            })
            .collect::<Vec<_>>();

        info!("Found {} matching items", hits.len());
        Ok(SearchReport {
            backup_root: self.chain.root().to_path_buf(),
            hits,
            snapshots_scanned: snapshots.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn collect_matches(
    folder: &FolderEntry,
    rel: &Path,
    pattern: &Regex,
    label: &str,
    found: &mut BTreeMap<(PathBuf, EntryKind), (String, String)>,
) {
    for child in &folder.children {
        let path = rel.join(child.name());
        if pattern.is_match(child.name()) {
            let stored_in = match child {
                Entry::File(f) => f.snapshot_label.clone(),
                Entry::Folder(_) => label.to_string(),
            };
            found
                .entry((path.clone(), child.kind()))
                .or_insert_with(|| (label.to_string(), stored_in));
        }
        if let Entry::Folder(sub) = child {
            collect_matches(sub, &path, pattern, label, found);
        }
    }
}

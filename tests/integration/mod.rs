//! Integration tests for Snapchain
//!
//! Multi-run backup histories driven through a small harness: every run gets
//! its own day in January 2024 and every write pins the file's modification
//! time, so change detection is deterministic.

use ::snapchain::manifest::load_manifest;
use ::snapchain::snapshot::parse_argument_date;
use ::snapchain::*;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use filetime::FileTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Source and backup directories plus a run clock
pub struct BackupHarness {
    pub source: TempDir,
    pub backups: TempDir,
    pub chain: Snapchain,
    day: u32,
}

impl BackupHarness {
    /// Harness with default configuration
    pub fn new() -> Result<Self> {
        Self::with_builder(SnapchainBuilder::new())
    }

    /// Harness with a custom builder
    pub fn with_builder(builder: SnapchainBuilder) -> Result<Self> {
        let source = TempDir::new()?;
        let backups = TempDir::new()?;
        let chain = builder.build(backups.path().to_path_buf())?;
        Ok(Self {
            source,
            backups,
            chain,
            day: 0,
        })
    }

    /// Midnight of the given January 2024 day
    pub fn day(day: u32) -> NaiveDateTime {
        parse_argument_date(&format!("2024-01-{:02}-00-00-00", day)).unwrap()
    }

    /// Write a source file with a pinned modification time
    pub fn write(&self, rel: &str, content: &str, mtime_secs: i64) -> Result<()> {
        let path = self.source.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0))?;
        Ok(())
    }

    /// Remove a source file or folder
    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.source.path().join(rel);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Run the next backup, one day after the previous one
    pub fn run(&mut self, kind: SnapshotKind) -> Result<BackupResult> {
        self.day += 1;
        let result = self
            .chain
            .backup_at(self.source.path(), kind, Self::day(self.day))
            .with_context(|| format!("backup on day {}", self.day))?;
        Ok(result)
    }

    /// Restore the state as of `instant` into a fresh directory
    pub fn restore_at(&self, instant: NaiveDateTime) -> Result<(TempDir, RestoreResult)> {
        let target = TempDir::new()?;
        let result = self.chain.restore(&RestoreRequest {
            target: target.path().to_path_buf(),
            instant: Some(instant),
            subfolder: None,
        })?;
        Ok((target, result))
    }

    /// Current source contents keyed by relative path
    pub fn source_contents(&self) -> Result<BTreeMap<PathBuf, String>> {
        read_tree(self.source.path())
    }
}

/// All files under `root` with their contents, keyed by relative path
pub fn read_tree(root: &Path) -> Result<BTreeMap<PathBuf, String>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root)?.to_path_buf();
            files.insert(rel, fs::read_to_string(entry.path())?);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_restore_reproduces_every_run() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        let mut states = Vec::new();

        harness.write("work/notes.txt", "notes v1", 1_000)?;
        harness.write("work/plan/q1.txt", "q1", 1_000)?;
        harness.write("readme.txt", "readme", 1_000)?;
        harness.run(SnapshotKind::Full)?;
        states.push(harness.source_contents()?);

        harness.write("work/notes.txt", "notes v2", 2_000)?;
        harness.write("work/plan/q2.txt", "q2", 2_000)?;
        harness.run(SnapshotKind::Incremental)?;
        states.push(harness.source_contents()?);

        harness.remove("work/plan/q1.txt")?;
        harness.write("work/todo.txt", "todo", 3_000)?;
        harness.run(SnapshotKind::Incremental)?;
        states.push(harness.source_contents()?);

        harness.write("work/notes.txt", "notes v3", 4_000)?;
        harness.remove("work/plan")?;
        harness.run(SnapshotKind::Incremental)?;
        states.push(harness.source_contents()?);

        for (i, expected) in states.iter().enumerate() {
            let day = i as u32 + 1;
            let (target, result) = harness.restore_at(BackupHarness::day(day))?;
            assert!(result.unrecoverable.is_empty());
            assert_eq!(&read_tree(target.path())?, expected, "state after run {}", day);
        }
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_incremental_stores_only_changes() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        for i in 0..10 {
            harness.write(&format!("data/file{}.txt", i), "same", 1_000)?;
        }
        let full = harness.run(SnapshotKind::Full)?;
        assert_eq!(full.stats.files_copied, 10);

        harness.write("data/file3.txt", "changed", 2_000)?;
        harness.write("data/new.txt", "new", 2_000)?;
        let incr = harness.run(SnapshotKind::Incremental)?;

        assert_eq!(incr.stats.files_copied, 2);
        assert_eq!(incr.file_count, 11);
        let stored = read_tree(&incr.snapshot_dir.join("data"))?;
        assert_eq!(
            stored.keys().cloned().collect::<Vec<_>>(),
            vec![PathBuf::from("file3.txt"), PathBuf::from("new.txt")]
        );
        Ok(())
    }

    #[test]
    fn test_restore_between_runs_uses_earlier_snapshot() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        harness.write("a/doc.txt", "first", 1_000)?;
        harness.run(SnapshotKind::Full)?;
        harness.write("a/doc.txt", "second", 2_000)?;
        harness.run(SnapshotKind::Incremental)?;

        let midday = parse_argument_date("2024-01-01-12-30-00")?;
        let (target, result) = harness.restore_at(midday)?;
        assert_eq!(result.snapshot, "2024-01-01 00;00;00 (Full)");
        assert_eq!(fs::read_to_string(target.path().join("a/doc.txt"))?, "first");
        Ok(())
    }

    #[test]
    fn test_new_full_snapshot_resets_the_chain() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        harness.write("a/one.txt", "one", 1_000)?;
        harness.run(SnapshotKind::Full)?;
        harness.write("a/two.txt", "two", 2_000)?;
        harness.run(SnapshotKind::Incremental)?;

        let full = harness.run(SnapshotKind::Full)?;
        assert!(full.previous.is_none());
        assert_eq!(full.stats.files_copied, 2);

        let manifest = load_manifest(&full.snapshot_dir)?;
        for (path, file) in manifest.files() {
            assert_eq!(file.snapshot_label, full.label, "{:?}", path);
        }
        Ok(())
    }

    #[test]
    fn test_vanished_top_level_folder_is_still_restored() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        harness.write("External/photo.jpg", "jpeg", 1_000)?;
        harness.write("Documents/cv.txt", "cv", 1_000)?;
        harness.run(SnapshotKind::Full)?;

        harness.remove("External")?;
        harness.run(SnapshotKind::Incremental)?;
        harness.run(SnapshotKind::Incremental)?;

        let (target, _) = harness.restore_at(BackupHarness::day(3))?;
        assert_eq!(fs::read_to_string(target.path().join("External/photo.jpg"))?, "jpeg");
        assert_eq!(fs::read_to_string(target.path().join("Documents/cv.txt"))?, "cv");
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_recovery_counts_files_from_other_snapshots() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        harness.write("a/keep.txt", "keep", 1_000)?;
        harness.write("a/gone.txt", "gone", 1_000)?;
        let full = harness.run(SnapshotKind::Full)?;
        harness.write("a/keep.txt", "keep v2", 2_000)?;
        harness.run(SnapshotKind::Incremental)?;

        fs::remove_file(full.snapshot_dir.join("a/gone.txt"))?;

        let (target, result) = harness.restore_at(BackupHarness::day(2))?;
        assert_eq!(result.files_restored, 1);
        assert_eq!(result.unrecoverable, vec![PathBuf::from("a/gone.txt")]);
        assert_eq!(fs::read_to_string(target.path().join("a/keep.txt"))?, "keep v2");
        assert!(!target.path().join("a/gone.txt").exists());
        Ok(())
    }

    #[test]
    fn test_folder_name_mapping_across_machines() -> Result<()> {
        let mapping = FolderNameMapping::from_pairs([("OneDrive - Home", "OneDrive")]);
        let mut harness =
            BackupHarness::with_builder(SnapchainBuilder::new().folder_name_mapping(mapping))?;
        harness.write("OneDrive - Home/Reports/r.txt", "report", 1_000)?;
        let full = harness.run(SnapshotKind::Full)?;

        let manifest = load_manifest(&full.snapshot_dir)?;
        assert!(manifest.child("OneDrive").is_some());
        assert!(manifest.child("OneDrive - Home").is_none());
        assert!(full.snapshot_dir.join("OneDrive/Reports/r.txt").is_file());

        let (target, _) = harness.restore_at(BackupHarness::day(1))?;
        assert_eq!(
            fs::read_to_string(target.path().join("OneDrive - Home/Reports/r.txt"))?,
            "report"
        );
        Ok(())
    }

    #[test]
    fn test_restore_subfolder_only() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        harness.write("projects/site/index.html", "<html>", 1_000)?;
        harness.write("projects/site/css/style.css", "body{}", 1_000)?;
        harness.write("music/song.mp3", "la", 1_000)?;
        harness.run(SnapshotKind::Full)?;

        let target = TempDir::new()?;
        let result = harness.chain.restore(&RestoreRequest {
            target: target.path().to_path_buf(),
            instant: None,
            subfolder: Some(PathBuf::from("projects/site")),
        })?;

        assert_eq!(result.files_restored, 2);
        let restored = read_tree(target.path())?;
        assert_eq!(
            restored.keys().cloned().collect::<Vec<_>>(),
            vec![
                PathBuf::from("projects/site/css/style.css"),
                PathBuf::from("projects/site/index.html"),
            ]
        );

        let err = harness
            .chain
            .restore(&RestoreRequest {
                target: target.path().to_path_buf(),
                instant: None,
                subfolder: Some(PathBuf::from("projects/missing")),
            })
            .unwrap_err();
        assert!(matches!(err, SnapchainError::SubfolderNotFound(_)));
        Ok(())
    }

    #[test]
    fn test_search_report_written_next_to_previous_reports() -> Result<()> {
        let mut harness = BackupHarness::new()?;
        harness.write("finance/invoice-2023.pdf", "pdf", 1_000)?;
        harness.write("finance/Invoices/march.pdf", "pdf", 1_000)?;
        harness.run(SnapshotKind::Full)?;
        harness.remove("finance/invoice-2023.pdf")?;
        harness.run(SnapshotKind::Incremental)?;

        let reports = TempDir::new()?;
        let query = SearchQuery {
            pattern: "(?i)invoice".to_string(),
            start: BackupHarness::day(1),
            end: BackupHarness::day(2),
        };

        let (report, first) = harness.chain.search_to_dir(&query, reports.path())?;
        assert_eq!(first, reports.path().join("searchresults.csv"));
        assert_eq!(report.snapshots_scanned, 2);
        assert_eq!(report.hits.len(), 2);

        let deleted = report
            .hits
            .iter()
            .find(|h| h.path == Path::new("finance/invoice-2023.pdf"))
            .context("deleted file missing from report")?;
        assert_eq!(deleted.kind, EntryKind::File);
        assert_eq!(deleted.found_in, "2024-01-01 00;00;00 (Full)");

        let folder = report
            .hits
            .iter()
            .find(|h| h.path == Path::new("finance/Invoices"))
            .context("folder missing from report")?;
        assert_eq!(folder.kind, EntryKind::Folder);
        assert_eq!(folder.found_in, "2024-01-02 00;00;00 (Incremental)");

        let csv = fs::read_to_string(&first)?;
        assert!(csv.starts_with("sep=,\n"));
        assert_eq!(csv.lines().count(), 4);

        let (_, second) = harness.chain.search_to_dir(&query, reports.path())?;
        assert_eq!(second, reports.path().join("searchresults (1).csv"));
        Ok(())
    }
}

//! Main test module for Snapchain
//!
//! This module includes all test suites:
//! - Integration tests for multi-run backup histories
//! - Property-based tests for manifest invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::snapchain::manifest::{load_manifest, manifest_path, FULL_PATH_MANIFEST_FILE_NAME};
    use ::snapchain::snapshot::parse_argument_date;
    use ::snapchain::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_empty_source_directory() {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let restore_dir = TempDir::new().unwrap();

        let chain = Snapchain::open(backups.path().to_path_buf()).unwrap();
        let result = chain
            .backup_at(
                source.path(),
                SnapshotKind::Full,
                parse_argument_date("2024-01-01-00-00-00").unwrap(),
            )
            .unwrap();

        assert_eq!(result.file_count, 0);
        assert!(manifest_path(&result.snapshot_dir).is_file());
        assert!(result.snapshot_dir.join(FULL_PATH_MANIFEST_FILE_NAME).is_file());

        let manifest = load_manifest(&result.snapshot_dir).unwrap();
        assert!(manifest.children.is_empty());

        let restored = chain
            .restore(&RestoreRequest {
                target: restore_dir.path().to_path_buf(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(restored.files_restored, 0);
    }

    #[test]
    fn test_excluded_names_and_paths() {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();

        fs::write(source.path().join("keep.txt"), "keep").unwrap();
        fs::write(source.path().join(".DS_Store"), "junk").unwrap();
        fs::write(source.path().join(".0a1b2c3d-4e5f-6789-abcd-ef0123456789"), "guid").unwrap();
        fs::create_dir_all(source.path().join("app").join("node_modules").join("dep")).unwrap();
        fs::write(source.path().join("app").join("node_modules").join("dep").join("i.js"), "x").unwrap();
        fs::write(source.path().join("app").join("main.js"), "main").unwrap();

        let chain = SnapchainBuilder::new()
            .excluded_files(vec![".DS_Store".to_string()])
            .excluded_paths(vec!["Node_Modules".to_string()])
            .build(backups.path().to_path_buf())
            .unwrap();
        let result = chain
            .backup_at(
                source.path(),
                SnapshotKind::Full,
                parse_argument_date("2024-01-01-00-00-00").unwrap(),
            )
            .unwrap();

        let manifest = load_manifest(&result.snapshot_dir).unwrap();
        let paths: Vec<PathBuf> = manifest.files().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec![PathBuf::from("app/main.js"), PathBuf::from("keep.txt")]);
        assert!(!result.snapshot_dir.join(".DS_Store").exists());
        assert!(!result.snapshot_dir.join("app").join("node_modules").exists());
    }

    #[test]
    fn test_non_snapshot_entries_in_backup_root_are_ignored() {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "a").unwrap();

        fs::create_dir(backups.path().join("notes")).unwrap();
        fs::write(backups.path().join("searchresults.csv"), "sep=,\n").unwrap();

        let chain = Snapchain::open(backups.path().to_path_buf()).unwrap();
        let err = chain
            .backup(source.path(), SnapshotKind::Incremental)
            .unwrap_err();
        assert!(matches!(err, SnapchainError::NoPreviousBackup(_)));
        assert!(chain.chain().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_manifest_is_reported() {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "a").unwrap();

        let chain = Snapchain::open(backups.path().to_path_buf()).unwrap();
        let full = chain
            .backup_at(
                source.path(),
                SnapshotKind::Full,
                parse_argument_date("2024-01-01-00-00-00").unwrap(),
            )
            .unwrap();
        fs::write(manifest_path(&full.snapshot_dir), "{ not json").unwrap();

        let err = chain
            .backup_at(
                source.path(),
                SnapshotKind::Incremental,
                parse_argument_date("2024-01-02-00-00-00").unwrap(),
            )
            .unwrap_err();
        assert!(err.is_corruption());
        assert!(!backups.path().join("2024-01-02 00;00;00 (Incremental)").exists());
    }

    #[test]
    fn test_source_must_be_a_directory() {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let file = source.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let chain = Snapchain::open(backups.path().to_path_buf()).unwrap();
        let err = chain.backup(&file, SnapshotKind::Full).unwrap_err();
        assert!(err.is_user_error());
    }
}

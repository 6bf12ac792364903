//! Property-based testing for Snapchain
//!
//! Uses proptest to verify manifest and backup-chain invariants across
//! randomly generated source trees.

use ::snapchain::manifest::{load_manifest, store_manifest};
use ::snapchain::restore::fallback_order;
use ::snapchain::snapshot::parse_argument_date;
use ::snapchain::*;
use chrono::{Duration, NaiveDateTime};
use filetime::FileTime;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

const LABEL: &str = "2024-01-01 00;00;00 (Full)";

/// Generated source tree node; files carry a modification time in seconds
#[derive(Debug, Clone)]
pub enum Node {
    File(i64),
    Folder(BTreeMap<String, Node>),
}

/// Generate a node: a file or a folder of uniquely named children
fn node_strategy() -> impl Strategy<Value = Node> {
    let leaf = (1i64..2_000_000_000).prop_map(Node::File);
    leaf.prop_recursive(4, 48, 5, |inner| {
        prop::collection::btree_map("[a-z]{1,8}", inner, 0..5).prop_map(Node::Folder)
    })
}

/// Generate the children of a source root
fn tree_strategy() -> impl Strategy<Value = BTreeMap<String, Node>> {
    prop::collection::btree_map("[a-z]{1,8}(\\.txt)?", node_strategy(), 0..6)
}

/// Build a manifest folder from generated children
fn to_manifest(name: &str, children: &BTreeMap<String, Node>) -> FolderEntry {
    let mut folder = FolderEntry::new(name, LABEL);
    for (child_name, node) in children {
        match node {
            Node::File(ts) => folder.push(Entry::File(FileEntry::new(child_name.as_str(), *ts, LABEL))),
            Node::Folder(sub) => folder.push(Entry::Folder(to_manifest(child_name, sub))),
        }
    }
    folder
}

/// Write generated children to disk under `dir`
fn write_tree(dir: &Path, children: &BTreeMap<String, Node>) {
    fs::create_dir_all(dir).unwrap();
    for (name, node) in children {
        let path = dir.join(name);
        match node {
            Node::File(secs) => {
                fs::write(&path, format!("{}:{}", name, secs)).unwrap();
                filetime::set_file_mtime(&path, FileTime::from_unix_time(*secs, 0)).unwrap();
            }
            Node::Folder(sub) => write_tree(&path, sub),
        }
    }
}

fn count_files(children: &BTreeMap<String, Node>) -> usize {
    children
        .values()
        .map(|node| match node {
            Node::File(_) => 1,
            Node::Folder(sub) => count_files(sub),
        })
        .sum()
}

fn read_files(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn day(n: i64) -> NaiveDateTime {
    parse_argument_date("2024-01-01-00-00-00").unwrap() + Duration::days(n)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_manifest_survives_persistence(children in tree_strategy()) {
        let dir = TempDir::new().unwrap();
        let manifest = to_manifest("", &children);

        store_manifest(dir.path(), &manifest).unwrap();
        let loaded = load_manifest(dir.path()).unwrap();

        prop_assert_eq!(loaded, manifest);
    }

    #[test]
    fn prop_full_backup_labels_every_file(children in tree_strategy()) {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        write_tree(source.path(), &children);

        let chain = Snapchain::open(backups.path().to_path_buf()).unwrap();
        let full = chain.backup_at(source.path(), SnapshotKind::Full, day(0)).unwrap();

        prop_assert_eq!(full.file_count, count_files(&children));
        prop_assert_eq!(full.stats.files_copied, count_files(&children));
        let manifest = load_manifest(&full.snapshot_dir).unwrap();
        for (_, file) in manifest.files() {
            prop_assert_eq!(file.snapshot_label.as_str(), full.label.as_str());
        }
    }

    #[test]
    fn prop_unchanged_source_copies_nothing(children in tree_strategy()) {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        write_tree(source.path(), &children);

        let chain = Snapchain::open(backups.path().to_path_buf()).unwrap();
        let full = chain.backup_at(source.path(), SnapshotKind::Full, day(0)).unwrap();
        let first = chain.backup_at(source.path(), SnapshotKind::Incremental, day(1)).unwrap();
        let second = chain.backup_at(source.path(), SnapshotKind::Incremental, day(2)).unwrap();

        prop_assert_eq!(first.stats.files_copied, 0);
        prop_assert_eq!(second.stats.files_copied, 0);
        prop_assert_eq!(
            load_manifest(&full.snapshot_dir).unwrap(),
            load_manifest(&second.snapshot_dir).unwrap()
        );
    }

    #[test]
    fn prop_restore_reproduces_source(
        before in tree_strategy(),
        after in tree_strategy(),
    ) {
        let source = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let restore_dir = TempDir::new().unwrap();

        // Both generations live below one top-level folder; generated names
        // never contain digits, so `v2` cannot collide with the first one
        write_tree(&source.path().join("data"), &before);
        let chain = Snapchain::open(backups.path().to_path_buf()).unwrap();
        chain.backup_at(source.path(), SnapshotKind::Full, day(0)).unwrap();

        fs::remove_dir_all(source.path().join("data")).unwrap();
        write_tree(&source.path().join("data").join("v2"), &after);
        chain.backup_at(source.path(), SnapshotKind::Incremental, day(1)).unwrap();

        let result = chain.restore(&RestoreRequest {
            target: restore_dir.path().to_path_buf(),
            ..Default::default()
        }).unwrap();

        prop_assert!(result.unrecoverable.is_empty());
        prop_assert_eq!(read_files(restore_dir.path()), read_files(source.path()));
    }

    #[test]
    fn prop_fallback_order_stays_within_target(
        days in prop::collection::btree_set(0i64..60, 1..12),
        recorded_index in any::<prop::sample::Index>(),
        target_index in any::<prop::sample::Index>(),
    ) {
        let labels: Vec<SnapshotLabel> = days
            .iter()
            .map(|d| SnapshotLabel::new(day(*d), SnapshotKind::Incremental))
            .collect();
        let recorded = recorded_index.get(&labels);
        let target = target_index.get(&labels);

        let order = fallback_order(&labels, recorded.as_str(), target);

        prop_assert!(order.iter().all(|l| *l <= target && *l != recorded));
        let expected = labels.iter().filter(|l| *l <= target && *l != recorded).count();
        prop_assert_eq!(order.len(), expected);

        // Snapshots newer than the recorded one come first
        let first_older = order.iter().position(|l| *l < recorded).unwrap_or(order.len());
        prop_assert!(order[first_older..].iter().all(|l| *l < recorded));
        prop_assert!(order[..first_older].windows(2).all(|w| w[0] < w[1]));
        prop_assert!(order[first_older..].windows(2).all(|w| w[0] > w[1]));
    }
}

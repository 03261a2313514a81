// tests/fs_abstraction.rs

use std::fs;
use std::path::{Path, PathBuf};

use buildwatch::engine::PendingChanges;
use buildwatch::fs::mock::{mtime, MockFileSystem};
use buildwatch::fs::{FileSystem, RealFileSystem};
use buildwatch::stale::scan::newest_mtime;
use buildwatch::watch::{ChangeBatch, ExcludeSet};

fn excludes() -> ExcludeSet {
    ExcludeSet::new(&["node_modules".to_string(), ".git".to_string()]).unwrap()
}

fn batch(paths: &[&str]) -> ChangeBatch {
    paths.iter().map(PathBuf::from).collect()
}

#[test]
fn mock_fs_links_files_into_parent_dirs() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/app/src/main.rs", mtime(10));

    assert!(fs.is_dir(Path::new("/proj/app")));
    assert!(fs.is_file(Path::new("/proj/app/src/main.rs")));
    assert_eq!(
        fs.read_dir(Path::new("/proj/app/src")).unwrap(),
        vec![PathBuf::from("/proj/app/src/main.rs")]
    );
    assert_eq!(fs.modified(Path::new("/proj/app/src/main.rs")).unwrap(), mtime(10));
    assert!(fs.modified(Path::new("/proj/app")).is_err());
    assert!(!fs.exists(Path::new("/proj/other")));
}

#[test]
fn mock_fs_injected_failures() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/app/a.rs", mtime(1));
    fs.fail_on("/proj/app");

    let err = fs.read_dir(Path::new("/proj/app")).unwrap_err();
    assert!(err.to_string().contains("injected IO failure"));
    // Existence checks are infallible.
    assert!(fs.is_dir(Path::new("/proj/app")));
}

#[test]
fn scan_skips_excluded_and_output_dirs() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.rs", mtime(10));
    fs.add_file("/proj/src/nested/b.rs", mtime(20));
    fs.add_file("/proj/node_modules/dep/index.js", mtime(99));
    fs.add_file("/proj/.buildwatch/app/out.js", mtime(50));

    let newest = newest_mtime(
        &fs,
        Path::new("/proj"),
        &excludes(),
        Some(Path::new("/proj/.buildwatch")),
    )
    .unwrap();

    assert_eq!(newest, Some(mtime(20)));
}

#[test]
fn scan_of_empty_tree_is_none() {
    let fs = MockFileSystem::new();
    fs.add_dir("/proj/out/app/empty");

    let newest = newest_mtime(&fs, Path::new("/proj/out/app"), &excludes(), None).unwrap();
    assert_eq!(newest, None);
}

#[test]
fn scan_propagates_errors() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.rs", mtime(10));
    fs.fail_on("/proj/src/a.rs");

    assert!(newest_mtime(&fs, Path::new("/proj/src"), &excludes(), None).is_err());
}

#[test]
fn real_fs_matches_std() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    fs::write(&file, "x").unwrap();

    let real = RealFileSystem;
    assert!(real.exists(&file));
    assert!(real.is_file(&file));
    assert!(real.is_dir(dir.path()));
    assert_eq!(real.read_dir(dir.path()).unwrap(), vec![file.clone()]);
    assert!(real.modified(&file).is_ok());

    let err = real.read_dir(&dir.path().join("missing")).unwrap_err();
    assert!(format!("{err:#}").contains("reading dir"));
}

#[test]
fn pending_changes_merge_into_one_batch() {
    let mut pending = PendingChanges::new();
    assert!(pending.is_empty());
    assert!(pending.drain().is_none());

    pending.record(batch(&["a/x.rs", "b/y.rs"]));
    pending.record(batch(&["a/x.rs", "c/z.rs"]));
    assert!(!pending.is_full_run());

    let merged = pending.drain().unwrap();
    assert_eq!(merged.len(), 3);
    assert!(merged.contains(Path::new("c/z.rs")));
    assert!(pending.is_empty());
}

#[test]
fn pending_full_run_dominates() {
    let mut pending = PendingChanges::new();
    pending.record(batch(&["a/x.rs"]));
    pending.record(ChangeBatch::new());
    pending.record(batch(&["b/y.rs"]));
    assert!(pending.is_full_run());

    assert!(pending.drain().unwrap().is_empty());
    assert!(pending.is_empty());

    pending.record(batch(&["a/x.rs"]));
    pending.clear();
    assert!(pending.drain().is_none());
}

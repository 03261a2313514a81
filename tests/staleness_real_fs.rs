// tests/staleness_real_fs.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;

use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;

use buildwatch::config::model::default_exclude_dirs;
use buildwatch::fs::RealFileSystem;
use buildwatch::stale::{Staleness, StalenessResolver};
use buildwatch::watch::{ChangeBatch, ExcludeSet};
use buildwatch_test_utils::builders::target;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn write_at(path: &Path, secs: i64) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"x")?;
    set_file_mtime(path, FileTime::from_unix_time(secs, 0))
}

fn resolver(root: &Path) -> StalenessResolver {
    let excludes = ExcludeSet::new(&default_exclude_dirs()).unwrap();
    StalenessResolver::new(Arc::new(RealFileSystem), root, ".buildwatch", excludes)
}

#[test]
fn detects_newer_sources_on_disk() -> TestResult {
    let dir = TempDir::new()?;
    let root = dir.path();
    write_at(&root.join("fn/a/index.ts"), 1_000)?;
    write_at(&root.join(".buildwatch/a/index.js"), 2_000)?;

    let r = resolver(root);
    let a = target("a", "fn/a");
    assert_eq!(r.check(&a)?, Staleness::UpToDate);

    write_at(&root.join("fn/a/util/helper.ts"), 3_000)?;
    assert_eq!(r.check(&a)?, Staleness::SourcesNewer);
    Ok(())
}

#[test]
fn missing_and_empty_output_dirs_are_stale() -> TestResult {
    let dir = TempDir::new()?;
    let root = dir.path();
    write_at(&root.join("fn/a/index.ts"), 1_000)?;

    let r = resolver(root);
    let a = target("a", "fn/a");
    assert_eq!(r.check(&a)?, Staleness::MissingOutput);

    fs::create_dir_all(root.join(".buildwatch/a/nested"))?;
    assert_eq!(r.check(&a)?, Staleness::EmptyOutput);
    Ok(())
}

#[test]
fn dependency_dirs_are_ignored_on_disk() -> TestResult {
    let dir = TempDir::new()?;
    let root = dir.path();
    write_at(&root.join("fn/a/index.ts"), 1_000)?;
    write_at(&root.join("fn/a/node_modules/x/index.js"), 9_000)?;
    write_at(&root.join("fn/a/.git/HEAD"), 9_000)?;
    write_at(&root.join(".buildwatch/a/index.js"), 2_000)?;

    let r = resolver(root);
    assert_eq!(r.check(&target("a", "fn/a"))?, Staleness::UpToDate);
    Ok(())
}

#[test]
fn absolute_event_paths_select_the_right_target() -> TestResult {
    let dir = TempDir::new()?;
    let root = dir.path();
    write_at(&root.join("fn/a/index.ts"), 3_000)?;
    write_at(&root.join("fn/b/index.ts"), 3_000)?;
    write_at(&root.join(".buildwatch/a/index.js"), 2_000)?;
    write_at(&root.join(".buildwatch/b/index.js"), 2_000)?;

    let r = resolver(root);
    let targets = vec![target("a", "fn/a"), target("b", "fn/b")];
    let batch: ChangeBatch = [root.join("fn/b/index.ts")].into_iter().collect();

    let selected = r.select(&batch, &targets);
    let names: Vec<_> = selected.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["b"]);
    Ok(())
}

// src/stale/scan.rs

//! Recursive modification-time scan over a directory tree.

use std::path::Path;
use std::time::SystemTime;

use anyhow::Result;

use crate::fs::FileSystem;
use crate::watch::patterns::ExcludeSet;

/// Newest modification time among all files under `dir`.
///
/// - Directories whose name matches `excludes` are not descended into.
/// - `skip` (an absolute directory) is not descended into either; this keeps
///   an output root that lives inside a source tree out of the source scan.
/// - Returns `Ok(None)` if the tree contains no files at all.
///
/// Any filesystem error aborts the scan; callers decide how to recover.
pub fn newest_mtime(
    fs: &dyn FileSystem,
    dir: &Path,
    excludes: &ExcludeSet,
    skip: Option<&Path>,
) -> Result<Option<SystemTime>> {
    let mut newest: Option<SystemTime> = None;
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        for entry in fs.read_dir(&current)? {
            if fs.is_dir(&entry) {
                let excluded = entry
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| excludes.matches_dir_name(n))
                    .unwrap_or(false);
                if excluded || skip.is_some_and(|s| s == entry.as_path()) {
                    continue;
                }
                stack.push(entry);
            } else if fs.is_file(&entry) {
                let modified = fs.modified(&entry)?;
                newest = Some(match newest {
                    Some(current) if current >= modified => current,
                    _ => modified,
                });
            }
        }
    }

    Ok(newest)
}

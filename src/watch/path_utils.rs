// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher and resolver.

use std::path::{Component, Path, PathBuf};

/// `path` relative to `root`, normalized.
///
/// - Relative paths are taken as already relative to `root`.
/// - Otherwise a direct `strip_prefix(root)` is tried first.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   both paths are canonicalized and compared again.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_relative() {
        return Some(normalize(path));
    }

    // Fast path: event path already starts with our root.
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(normalize(rel));
    }

    // More robust path: canonicalize both, then try again. This helps on
    // platforms (notably macOS) where different absolute prefixes may be used
    // for the same underlying directory (e.g. symlinks, /private/var/...).
    // A deleted file cannot be canonicalized, so fall back to its parent.
    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;

    path_canon.strip_prefix(&root_canon).ok().map(normalize)
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Never touches the filesystem.
///
/// `./a/../b/./c.ts` becomes `b/c.ts`; an empty result becomes `.`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// True if normalized `path` lies inside (or equals) normalized `root`.
///
/// The comparison is per component, so `a/bc.ts` is not under `a/b`.
/// A root of `.` contains every relative path.
pub fn is_under(path: &Path, root: &Path) -> bool {
    let path = normalize(path);
    let root = normalize(root);
    if root == Path::new(".") {
        return path.is_relative();
    }
    path.starts_with(&root)
}

// src/watch/patterns.rs

use std::fmt;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled directory-name globs that are never scanned or watched.
///
/// Patterns are matched against single path components (e.g. `"node_modules"`
/// or `".cache*"`), not against whole paths, so a pattern excludes a
/// directory wherever it appears in the tree.
#[derive(Clone)]
pub struct ExcludeSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for ExcludeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExcludeSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl ExcludeSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let set = build_globset(patterns).context("building exclude_dirs globset")?;
        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    /// An exclude set that matches nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True if a directory with this file name should be skipped.
    pub fn matches_dir_name(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// True if any component of `path` is an excluded directory name.
    ///
    /// The final component is checked too: events for a directory such as
    /// `dist` itself are as uninteresting as events for files inside it.
    pub fn contains_excluded(&self, path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .map(|s| self.matches_dir_name(s))
                .unwrap_or(false),
            _ => false,
        })
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid glob pattern {pattern:?}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

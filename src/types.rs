// src/types.rs

//! Shared value types: target descriptors and build status.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Canonical target name type used throughout the engine.
pub type TargetName = String;

/// Opaque per-target parameters handed to the build method dispatcher.
pub type BuildParameters = BTreeMap<String, String>;

/// How a target is built.
///
/// Unknown method names are kept as [`BuildMethod::Unsupported`] instead of
/// failing deserialization; they surface as a build failure for that one
/// target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum BuildMethod {
    /// Arbitrary shell command from the `cmd` parameter.
    Command,
    /// `make <target>` with `ARTIFACTS_DIR` pointing at the output directory.
    Make,
    /// `npm run <script>`.
    Npm,
    /// `cargo build` with `CARGO_TARGET_DIR` pointing at the output directory.
    Cargo,
    /// Copy the source tree verbatim into the output directory.
    Copy,
    Unsupported(String),
}

impl From<String> for BuildMethod {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "command" | "cmd" | "shell" => BuildMethod::Command,
            "make" | "makefile" => BuildMethod::Make,
            "npm" => BuildMethod::Npm,
            "cargo" => BuildMethod::Cargo,
            "copy" => BuildMethod::Copy,
            _ => BuildMethod::Unsupported(s),
        }
    }
}

impl From<&str> for BuildMethod {
    fn from(s: &str) -> Self {
        BuildMethod::from(s.to_string())
    }
}

impl fmt::Display for BuildMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMethod::Command => f.write_str("command"),
            BuildMethod::Make => f.write_str("make"),
            BuildMethod::Npm => f.write_str("npm"),
            BuildMethod::Cargo => f.write_str("cargo"),
            BuildMethod::Copy => f.write_str("copy"),
            BuildMethod::Unsupported(other) => f.write_str(other),
        }
    }
}

/// One independently buildable unit.
///
/// Immutable for the lifetime of a run; a new manifest load produces a new
/// set of descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub name: TargetName,
    /// Source tree of this target, relative to the project root.
    pub source_root: PathBuf,
    pub build_method: BuildMethod,
    pub build_parameters: BuildParameters,
}

impl TargetDescriptor {
    pub fn new(
        name: impl Into<TargetName>,
        source_root: impl Into<PathBuf>,
        build_method: BuildMethod,
    ) -> Self {
        Self {
            name: name.into(),
            source_root: source_root.into(),
            build_method,
            build_parameters: BuildParameters::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_parameters.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.build_parameters.get(key).map(String::as_str)
    }
}

/// Lifecycle of a single build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::Failure)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
        };
        f.pad(s)
    }
}

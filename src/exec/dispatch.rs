// src/exec/dispatch.rs

//! Build-method dispatch: turning a target descriptor into a build.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::BuildError;
use crate::types::{BuildMethod, TargetDescriptor};
use crate::watch::path_utils::normalize;
use crate::watch::patterns::ExcludeSet;

/// Raw result of one build invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub type BuildFuture<'a> = Pin<Box<dyn Future<Output = Result<BuildOutput, BuildError>> + Send + 'a>>;

/// Trait abstracting how one target is built.
///
/// Production code uses [`MethodDispatcher`]; tests provide scripted
/// implementations that never spawn processes.
pub trait BuildDispatcher: Send + Sync {
    /// Build `target`, writing artifacts into `output_dir`.
    fn execute<'a>(&'a self, target: &'a TargetDescriptor, output_dir: &'a Path) -> BuildFuture<'a>;
}

/// Dispatches on `target.build_method` and runs the matching tool.
#[derive(Debug, Clone)]
pub struct MethodDispatcher {
    root: PathBuf,
    output_root: PathBuf,
    excludes: ExcludeSet,
}

impl MethodDispatcher {
    /// - `root`: project root that relative source roots resolve against.
    /// - `output_root`: skipped by the `copy` method when it sits inside a
    ///   source tree.
    pub fn new(root: impl Into<PathBuf>, output_root: impl AsRef<Path>, excludes: ExcludeSet) -> Self {
        let root = normalize(&root.into());
        let output_root = normalize(&root.join(output_root.as_ref()));
        Self {
            root,
            output_root,
            excludes,
        }
    }

    fn source_dir(&self, target: &TargetDescriptor) -> PathBuf {
        normalize(&self.root.join(&target.source_root))
    }

    fn command_for(&self, target: &TargetDescriptor) -> Result<Command, BuildError> {
        let cmd = match &target.build_method {
            BuildMethod::Command => {
                let line = target.param("cmd").ok_or_else(|| BuildError::MissingParameter {
                    target: target.name.clone(),
                    param: "cmd".to_string(),
                })?;
                shell_command(line)
            }
            BuildMethod::Make => {
                let make_target = target
                    .param("make_target")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("build-{}", target.name));
                let mut c = Command::new("make");
                c.arg(make_target);
                c
            }
            BuildMethod::Npm => {
                let script = target.param("script").unwrap_or("build");
                let mut c = Command::new(if cfg!(windows) { "npm.cmd" } else { "npm" });
                c.arg("run").arg(script);
                c
            }
            BuildMethod::Cargo => {
                let mut c = Command::new("cargo");
                c.arg("build");
                if target.param("profile") == Some("release") {
                    c.arg("--release");
                }
                c
            }
            BuildMethod::Copy | BuildMethod::Unsupported(_) => {
                return Err(BuildError::UnsupportedMethod {
                    target: target.name.clone(),
                    method: target.build_method.to_string(),
                });
            }
        };
        Ok(cmd)
    }

    async fn run_process(
        &self,
        target: &TargetDescriptor,
        output_dir: &Path,
    ) -> Result<BuildOutput, BuildError> {
        let mut cmd = self.command_for(target)?;
        let source_dir = self.source_dir(target);

        cmd.current_dir(&source_dir)
            .env("BUILDWATCH_TARGET", &target.name)
            .env("BUILDWATCH_OUTPUT_DIR", output_dir)
            .env("BUILDWATCH_SOURCE_ROOT", &source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match target.build_method {
            BuildMethod::Make => {
                cmd.env("ARTIFACTS_DIR", output_dir);
            }
            BuildMethod::Cargo => {
                cmd.env("CARGO_TARGET_DIR", output_dir);
            }
            _ => {}
        }

        info!(
            target_name = %target.name,
            method = %target.build_method,
            "starting build process"
        );

        let child = cmd.spawn().map_err(|source| BuildError::Spawn {
            target: target.name.clone(),
            source,
        })?;

        let output = child.wait_with_output().await.map_err(|source| BuildError::Io {
            target: target.name.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stderr.lines() {
            debug!(target_name = %target.name, "stderr: {}", line);
        }

        Ok(BuildOutput {
            exit_code: output.status.code(),
            stdout,
            stderr,
        })
    }

    async fn copy_tree(&self, target: &TargetDescriptor, output_dir: &Path) -> Result<BuildOutput, BuildError> {
        let source_dir = self.source_dir(target);
        let output_dir = output_dir.to_path_buf();
        let excludes = self.excludes.clone();
        let output_root = self.output_root.clone();
        let name = target.name.clone();

        let copied = tokio::task::spawn_blocking(move || {
            copy_dir_recursive(&source_dir, &output_dir, &excludes, &output_root)
        })
        .await
        .map_err(|e| BuildError::Io {
            target: name.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| BuildError::Io {
            target: name.clone(),
            source,
        })?;

        Ok(BuildOutput {
            exit_code: Some(0),
            stdout: format!("copied {copied} files\n"),
            stderr: String::new(),
        })
    }
}

impl BuildDispatcher for MethodDispatcher {
    fn execute<'a>(&'a self, target: &'a TargetDescriptor, output_dir: &'a Path) -> BuildFuture<'a> {
        Box::pin(async move {
            if let BuildMethod::Unsupported(method) = &target.build_method {
                return Err(BuildError::UnsupportedMethod {
                    target: target.name.clone(),
                    method: method.clone(),
                });
            }

            tokio::fs::create_dir_all(output_dir)
                .await
                .map_err(|source| BuildError::Io {
                    target: target.name.clone(),
                    source,
                })?;

            match target.build_method {
                BuildMethod::Copy => self.copy_tree(target, output_dir).await,
                _ => self.run_process(target, output_dir).await,
            }
        })
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}

fn copy_dir_recursive(
    from: &Path,
    to: &Path,
    excludes: &ExcludeSet,
    skip: &Path,
) -> std::io::Result<usize> {
    std::fs::create_dir_all(to)?;
    let mut copied = 0;

    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let dest = to.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            let excluded = entry
                .file_name()
                .to_str()
                .map(|n| excludes.matches_dir_name(n))
                .unwrap_or(false);
            if excluded || path == skip {
                continue;
            }
            copied += copy_dir_recursive(&path, &dest, excludes, skip)?;
        } else {
            std::fs::copy(&path, &dest)?;
            copied += 1;
        }
    }

    Ok(copied)
}

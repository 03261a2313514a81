// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildwatch",
    version,
    about = "Watch source trees and incrementally rebuild stale targets.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the build manifest (TOML).
    ///
    /// Default: `Buildwatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Buildwatch.toml")]
    pub manifest: String,

    /// Build every target once, no watching. Exits non-zero if any build
    /// failed.
    #[arg(long)]
    pub once: bool,

    /// Only consider these targets (repeatable).
    #[arg(long = "target", value_name = "NAME")]
    pub targets: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print targets and settings, but don't build.
    #[arg(long)]
    pub dry_run: bool,

    /// Build one target at a time.
    #[arg(long, conflicts_with = "max_parallel")]
    pub no_parallel: bool,

    /// Override the concurrency limit from the manifest.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_parallel: Option<u16>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

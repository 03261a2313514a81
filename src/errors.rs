// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildwatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Staleness check failed for target '{target}': {source}")]
    StalenessCheck {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Watch process crashed: {0}")]
    WatchProcessCrash(String),

    #[error("Watch process restart limit reached after {attempts} attempts")]
    RestartExhausted { attempts: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a single target's build did not produce a clean exit.
///
/// These never escape the scheduler as a `Result::Err`; they are folded into
/// the target's `BuildTask` as error messages.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to spawn build process for '{target}': {source}")]
    Spawn {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported build method '{method}' for target '{target}'")]
    UnsupportedMethod { target: String, method: String },

    #[error("target '{target}' is missing required build parameter '{param}'")]
    MissingParameter { target: String, param: String },

    #[error("build of '{target}' timed out after {timeout:?}")]
    TimedOut { target: String, timeout: Duration },

    #[error("IO error while building '{target}': {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildwatchError>;

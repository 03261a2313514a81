// src/logging.rs

//! Logging setup for `buildwatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `BUILDWATCH_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for summaries and
//! dry-run output.

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::fmt;

use crate::cli::LogLevel;
use crate::engine::OrchestratorEvent;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("BUILDWATCH_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

/// Spawn the task that turns orchestrator events into log lines.
///
/// Ends when the runtime drops its event sender.
pub fn spawn_event_logger(mut rx: broadcast::Receiver<OrchestratorEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger fell behind; some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Format a single orchestrator event.
pub fn log_event(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::WatchStarted => info!("watch started"),
        OrchestratorEvent::FilesChanged { paths } => {
            if paths.is_empty() {
                info!("full rebuild requested");
            } else {
                info!(count = paths.len(), "files changed: {:?}", paths);
            }
        }
        OrchestratorEvent::NothingToBuild { changed } => {
            info!(changed, "all affected targets are up to date");
        }
        OrchestratorEvent::BuildStarted { target } => info!("[{target}] build started"),
        OrchestratorEvent::BuildCompleted {
            target,
            success,
            duration,
            errors,
        } => {
            if *success {
                info!("[{target}] build succeeded in {duration:.2?}");
            } else {
                error!("[{target}] build failed after {duration:.2?}");
                for line in errors {
                    error!("[{target}]   {line}");
                }
            }
        }
        OrchestratorEvent::AllBuildsComplete { summary, .. } => {
            info!(
                succeeded = summary.success_count,
                failed = summary.failure_count,
                "all builds complete\n{summary}"
            );
        }
        OrchestratorEvent::WatcherCrashed { error } => warn!("watcher crashed: {error}"),
        OrchestratorEvent::WatcherRestarting {
            attempt,
            max_attempts,
            delay,
        } => warn!("restarting watcher in {delay:?} (attempt {attempt}/{max_attempts})"),
        OrchestratorEvent::WatcherFailed { attempts, error } => error!(
            "watcher failed permanently after {attempts} restart attempts: {error}; reset required"
        ),
    }
}

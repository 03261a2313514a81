// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod sched;
pub mod stale;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, EngineSettings};
use crate::engine::{
    CoreRuntime, OrchestratorEvent, Runtime, RuntimeContext, RuntimeEvent, RuntimeOptions,
    StatusHandle,
};
use crate::exec::{BuildDispatcher, MethodDispatcher, RealBuildBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::sched::BuildScheduler;
use crate::stale::StalenessResolver;
use crate::types::TargetDescriptor;
use crate::watch::{ChangeBatch, ExcludeSet, NotifyWatchSource, RestartSupervisor};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading and CLI overrides
/// - staleness resolver / scheduler / restart supervisor / runtime
/// - build dispatch
/// - (optional) file watcher
/// - Ctrl-C handling
///
/// Returns `false` if the last completed batch had failures, which only
/// matters for `--once`.
pub async fn run(args: CliArgs) -> Result<bool> {
    let manifest_path = PathBuf::from(&args.manifest);
    let manifest = load_and_validate(&manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;

    let settings = apply_cli_overrides(EngineSettings::from_section(&manifest.config), &args);
    let targets = filter_targets(manifest.targets(), &args.targets)?;

    if args.dry_run {
        print_dry_run(&settings, &targets);
        return Ok(true);
    }

    let root = manifest_root_dir(&manifest_path);
    let excludes = ExcludeSet::new(&settings.exclude_dirs)?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let resolver = Arc::new(StalenessResolver::new(
        fs,
        root.clone(),
        &settings.output_dir,
        excludes.clone(),
    ));
    let dispatcher: Arc<dyn BuildDispatcher> = Arc::new(MethodDispatcher::new(
        root.clone(),
        &settings.output_dir,
        excludes.clone(),
    ));

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(1024);

    let backend = RealBuildBackend::new(dispatcher, rt_tx.clone(), settings.build_timeout);

    let (events_tx, events_rx) = broadcast::channel::<OrchestratorEvent>(256);
    let logger = logging::spawn_event_logger(events_rx);

    let initial_batch = startup_batch(&targets, args.once);

    let ctx = RuntimeContext {
        resolver,
        targets: Arc::new(targets),
        status: StatusHandle::new(),
        events: events_tx,
        debounce_delay: settings.debounce_delay,
    };

    let core = CoreRuntime::new(
        BuildScheduler::new(settings.max_parallel),
        RestartSupervisor::new(settings.max_restart_attempts, settings.restart_base_delay),
        RuntimeOptions {
            exit_when_idle: args.once,
        },
    );

    let mut runtime = Runtime::new(core, rt_rx, rt_tx.clone(), backend, ctx);

    // No watching in --once mode.
    if !args.once {
        runtime = runtime.with_watch_source(Box::new(NotifyWatchSource::new(
            root.clone(),
            settings.output_dir.clone(),
            excludes,
        )));
        rt_tx.send(RuntimeEvent::StartWatching).await?;
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(root = %root.display(), "initial build pass");
    rt_tx.send(RuntimeEvent::FilesChanged(initial_batch)).await?;
    drop(rt_tx);

    let summary = runtime.run().await?;

    if logger.await.is_err() {
        debug!("event logger task ended abnormally");
    }

    match summary {
        Some(summary) if args.once => {
            println!("{summary}");
            Ok(summary.all_succeeded())
        }
        _ => Ok(true),
    }
}

/// CLI flags win over the manifest.
pub fn apply_cli_overrides(mut settings: EngineSettings, args: &CliArgs) -> EngineSettings {
    if args.no_parallel {
        settings.max_parallel = 1;
    } else if let Some(n) = args.max_parallel {
        settings.max_parallel = usize::from(n).max(1);
    }
    settings
}

/// Keep only the targets named on the command line (all if none named).
pub fn filter_targets(
    targets: Vec<TargetDescriptor>,
    wanted: &[String],
) -> Result<Vec<TargetDescriptor>> {
    if wanted.is_empty() {
        return Ok(targets);
    }

    for name in wanted {
        if !targets.iter().any(|t| &t.name == name) {
            bail!("unknown target '{name}'");
        }
    }

    Ok(targets
        .into_iter()
        .filter(|t| wanted.contains(&t.name))
        .collect())
}

/// The batch that kicks off the first build pass.
///
/// `--once` forces a full build (empty batch). When watching, every
/// target's source root counts as changed, so only stale targets build.
pub fn startup_batch(targets: &[TargetDescriptor], once: bool) -> ChangeBatch {
    if once {
        return ChangeBatch::new();
    }
    targets.iter().map(|t| t.source_root.clone()).collect()
}

/// Figure out the project root.
///
/// - If the manifest path has a non-empty parent (e.g. "infra/Buildwatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Buildwatch.toml" (parent = ""),
///   we fall back to the current working directory.
fn manifest_root_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print settings and targets.
fn print_dry_run(settings: &EngineSettings, targets: &[TargetDescriptor]) {
    println!("buildwatch dry-run");
    println!("  debounce = {:?}", settings.debounce_delay);
    println!("  max_parallel = {}", settings.max_parallel);
    println!(
        "  restarts = {} (base delay {:?})",
        settings.max_restart_attempts, settings.restart_base_delay
    );
    println!("  output_dir = {}", settings.output_dir.display());
    println!("  exclude_dirs = {:?}", settings.exclude_dirs);
    if let Some(timeout) = settings.build_timeout {
        println!("  build_timeout = {timeout:?}");
    }
    println!();

    println!("targets ({}):", targets.len());
    for target in targets {
        println!("  - {}", target.name);
        println!("      source_root: {}", target.source_root.display());
        println!("      build_method: {}", target.build_method);
        for (key, value) in &target.build_parameters {
            println!("      {key}: {value}");
        }
    }

    debug!("dry-run complete (no builds)");
}

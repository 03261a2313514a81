// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{BuildwatchError, Result};
use crate::exec::{BuildBackend, ScheduledBuild};
use crate::report::RunSummary;
use crate::stale::StalenessResolver;
use crate::types::TargetDescriptor;
use crate::watch::{ChangeAggregator, ChangeBatch, WatchSource};

use super::core::CoreRuntime;
use super::events::OrchestratorEvent;
use super::status::StatusHandle;
use super::{CoreCommand, RuntimeEvent};

/// Shared, read-only collaborators of the runtime.
#[derive(Clone)]
pub struct RuntimeContext {
    pub resolver: Arc<StalenessResolver>,
    pub targets: Arc<Vec<TargetDescriptor>>,
    pub status: StatusHandle,
    pub events: broadcast::Sender<OrchestratorEvent>,
    pub debounce_delay: Duration,
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("targets", &self.targets.len())
            .field("debounce_delay", &self.debounce_delay)
            .finish_non_exhaustive()
    }
}

/// Drives the orchestration core in response to `RuntimeEvent`s, and
/// delegates actual build execution to a `BuildBackend`.
///
/// This is an IO shell around `CoreRuntime`, which contains all the runtime
/// semantics. This struct handles async IO: reading events from the
/// channel, running the staleness resolver off the event loop, starting
/// builds, and owning the watch source, the change aggregator and the
/// restart timer.
pub struct Runtime<B: BuildBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    event_tx: mpsc::Sender<RuntimeEvent>,
    backend: B,
    ctx: RuntimeContext,
    watch_source: Option<Box<dyn WatchSource>>,
    aggregator: Option<ChangeAggregator>,
    restart_timer: Option<JoinHandle<()>>,
    /// Events produced synchronously by command execution (e.g. watcher
    /// start results); handled before anything else from the channel.
    follow_ups: VecDeque<RuntimeEvent>,
    last_summary: Option<RunSummary>,
}

impl<B: BuildBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend> Runtime<B> {
    /// `event_tx` must be the sending half of `event_rx`; the runtime uses it
    /// for timers, the aggregator and resolver results.
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        backend: B,
        ctx: RuntimeContext,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            backend,
            ctx,
            watch_source: None,
            aggregator: None,
            restart_timer: None,
            follow_ups: VecDeque::new(),
            last_summary: None,
        }
    }

    /// Attach the watch source the supervisor will start and restart.
    pub fn with_watch_source(mut self, source: Box<dyn WatchSource>) -> Self {
        self.watch_source = Some(source);
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (resolve, build, restart,
    ///   exit).
    ///
    /// Returns the summary of the last completed batch, if any.
    pub async fn run(mut self) -> Result<Option<RunSummary>> {
        info!("buildwatch runtime started");

        self.aggregator = Some(ChangeAggregator::spawn(
            self.ctx.debounce_delay,
            self.event_tx.clone(),
        ));
        self.publish_status();

        loop {
            let event = match self.follow_ups.pop_front() {
                Some(e) => e,
                None => match self.event_rx.recv().await {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
            };

            debug!(?event, "runtime received event");

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }
            self.publish_status();

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        self.teardown().await;
        info!("runtime exiting");
        Ok(self.last_summary)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Emit(event) => self.emit(event),
            CoreCommand::ResolveTargets(batch) => self.resolve(batch),
            CoreCommand::DispatchBuilds { batch_id, targets } => {
                self.dispatch(batch_id, targets).await?;
            }
            CoreCommand::StartWatcher => self.start_watcher(),
            CoreCommand::StopWatcher => {
                if let Some(source) = self.watch_source.as_mut() {
                    source.stop();
                }
            }
            CoreCommand::ScheduleRestart(delay) => self.schedule_restart(delay),
            CoreCommand::ForwardToAggregator(paths) => {
                if let Some(aggregator) = &self.aggregator {
                    aggregator.notify(paths);
                }
            }
            CoreCommand::FlushAggregator => {
                if let Some(aggregator) = &self.aggregator {
                    aggregator.flush();
                }
            }
            CoreCommand::ConfigureAggregator(delay) => {
                if let Some(aggregator) = &self.aggregator {
                    aggregator.set_delay(delay);
                }
            }
            CoreCommand::ShutdownAggregator => {
                if let Some(aggregator) = self.aggregator.take() {
                    aggregator.shutdown().await;
                }
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    fn emit(&mut self, event: OrchestratorEvent) {
        if let OrchestratorEvent::AllBuildsComplete { summary, .. } = &event {
            self.last_summary = Some(summary.clone());
        }
        // No subscribers is fine; events are advisory.
        let _ = self.ctx.events.send(event);
    }

    /// Run the resolver on the blocking pool; it walks directory trees.
    ///
    /// If the resolver task itself dies, every target is selected.
    fn resolve(&self, batch: ChangeBatch) {
        let resolver = Arc::clone(&self.ctx.resolver);
        let targets = Arc::clone(&self.ctx.targets);
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let all = Arc::clone(&targets);
            let selected =
                match tokio::task::spawn_blocking(move || resolver.select(&batch, &targets)).await {
                    Ok(selected) => selected,
                    Err(err) => {
                        warn!(error = %err, "staleness resolution failed; rebuilding every target");
                        all.to_vec()
                    }
                };
            if tx.send(RuntimeEvent::TargetsSelected(selected)).await.is_err() {
                debug!("runtime gone before target selection could be delivered");
            }
        });
    }

    async fn dispatch(&mut self, batch_id: u64, targets: Vec<TargetDescriptor>) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }

        let builds: Vec<ScheduledBuild> = targets
            .into_iter()
            .map(|target| ScheduledBuild {
                batch_id,
                output_dir: self.ctx.resolver.output_dir_for(&target),
                target,
            })
            .collect();

        let names: Vec<_> = builds.iter().map(|b| b.target.name.as_str()).collect();
        debug!(?names, batch_id, "spawning admitted builds");

        self.backend.spawn_builds(builds).await
    }

    fn start_watcher(&mut self) {
        let Some(source) = self.watch_source.as_mut() else {
            debug!("no watch source attached; nothing to start");
            return;
        };

        match source.start(self.event_tx.clone()) {
            Ok(()) => self.follow_ups.push_back(RuntimeEvent::WatcherStarted),
            Err(err) => {
                let crash =
                    BuildwatchError::WatchProcessCrash(format!("failed to start: {err:#}"));
                self.follow_ups
                    .push_back(RuntimeEvent::WatcherCrashed(crash.to_string()));
            }
        }
    }

    /// One backoff timer per runtime; a newer schedule replaces the old one.
    fn schedule_restart(&mut self, delay: Duration) {
        if let Some(timer) = self.restart_timer.take() {
            timer.abort();
        }
        let tx = self.event_tx.clone();
        self.restart_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RuntimeEvent::RestartTimerElapsed).await;
        }));
    }

    fn publish_status(&self) {
        self.ctx.status.publish(self.core.snapshot());
    }

    async fn teardown(&mut self) {
        if let Some(timer) = self.restart_timer.take() {
            timer.abort();
        }
        if let Some(source) = self.watch_source.as_mut() {
            source.stop();
        }
        if let Some(aggregator) = self.aggregator.take() {
            aggregator.shutdown().await;
        }
    }
}

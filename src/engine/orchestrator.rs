// src/engine/orchestrator.rs

//! The orchestrator: worker lifecycle management around [`OrchestratorCore`].
//!
//! This is the IO half of the engine. It starts worker threads, holds their
//! signal controllers, drains the status and snapshot channels and feeds
//! what it finds into the pure core. None of its operations wait for a
//! worker: control requests only flip flags, and `poll` only takes what is
//! already queued.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::thread::JoinHandle;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ConfigFile, WorkerSection};
use crate::errors::{ProcsyncError, Result};
use crate::event_log::{EventLog, LogEntry, LogLevel};
use crate::sampler::{MetricsSource, ResourceSampler, ResourceSnapshot, SamplerHandle, SystemMetricsSource};
use crate::types::{Priority, SpeedFactor, WorkKind, WorkerId};
use crate::worker::{
    SignalController, StatusReceiver, StatusSink, WorkContext, WorkFactory, Worker, WorkerExit,
    WorkerSpec, WorkerState, signal_channel, simulated_work_factory, status_channel,
};

use super::core::OrchestratorCore;
use super::table::WorkerRecord;

/// Kinds the orchestrator picks from when a spawn request leaves it open.
const PICKABLE_KINDS: [WorkKind; 4] = [WorkKind::Cpu, WorkKind::Io, WorkKind::Memory, WorkKind::Mixed];

/// Parameters of a single spawn request.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// `None` lets the orchestrator choose with its seeded RNG.
    pub work_kind: Option<WorkKind>,
    pub speed: SpeedFactor,
    pub priority: Priority,
    pub total_units: u32,
    pub unit_delay: Duration,
    pub log_probability: f64,
}

impl WorkerConfig {
    pub fn from_defaults(section: &WorkerSection) -> Self {
        Self {
            work_kind: Some(section.kind),
            speed: section.speed,
            priority: section.priority,
            total_units: section.total_units.max(1),
            unit_delay: Duration::from_millis(section.unit_delay_ms),
            log_probability: section.log_probability,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_defaults(&WorkerSection::default())
    }
}

/// Result of a pause/resume/terminate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The flag changed and the worker will act on it.
    Applied,
    /// The flag was already in the requested state.
    Unchanged,
    /// The worker had already finished; nothing was signalled.
    AlreadyTerminal,
}

/// What one `poll` observed.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    /// Ids whose record changed, ascending.
    pub changed_workers: Vec<WorkerId>,
    /// Event log entries appended since the previous poll.
    pub new_log_entries: Vec<LogEntry>,
    /// Newest snapshot received during this poll, if any.
    pub latest_resource_snapshot: Option<ResourceSnapshot>,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.changed_workers.is_empty()
            && self.new_log_entries.is_empty()
            && self.latest_resource_snapshot.is_none()
    }

    /// Fold a later report into this one.
    pub fn merge(&mut self, later: PollReport) {
        let ids: BTreeSet<WorkerId> = self
            .changed_workers
            .drain(..)
            .chain(later.changed_workers)
            .collect();
        self.changed_workers = ids.into_iter().collect();
        self.new_log_entries.extend(later.new_log_entries);
        if later.latest_resource_snapshot.is_some() {
            self.latest_resource_snapshot = later.latest_resource_snapshot;
        }
    }
}

/// Read-only copy of the state table.
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub workers: Vec<WorkerRecord>,
    pub resources: Option<ResourceSnapshot>,
}

impl TableSnapshot {
    pub fn worker(&self, id: WorkerId) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn count_in(&self, state: WorkerState) -> usize {
        self.workers.iter().filter(|w| w.state == state).count()
    }
}

struct LiveWorker {
    controller: SignalController,
    thread: Option<JoinHandle<WorkerExit>>,
}

/// Builds an [`Orchestrator`] from a validated configuration.
///
/// ```no_run
/// # async fn demo() -> procsync::errors::Result<()> {
/// use procsync::config::ConfigFile;
/// use procsync::engine::{OrchestratorBuilder, WorkerConfig};
///
/// let mut orchestrator = OrchestratorBuilder::new(ConfigFile::default())
///     .seed(7)
///     .build()?;
/// let id = orchestrator.spawn(WorkerConfig::default())?;
/// orchestrator.pause(id)?;
/// # Ok(())
/// # }
/// ```
pub struct OrchestratorBuilder {
    config: ConfigFile,
    work_factory: Option<WorkFactory>,
    metrics_source: Option<Box<dyn MetricsSource>>,
    seed: Option<u64>,
}

impl OrchestratorBuilder {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            config,
            work_factory: None,
            metrics_source: None,
            seed: None,
        }
    }

    /// Replace the simulated work of every spawned worker.
    pub fn work_factory(mut self, factory: WorkFactory) -> Self {
        self.work_factory = Some(factory);
        self
    }

    /// Replace the `sysinfo`-backed metrics source.
    pub fn metrics_source(mut self, source: Box<dyn MetricsSource>) -> Self {
        self.metrics_source = Some(source);
        self
    }

    /// Overrides `[orchestrator].seed`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Create the orchestrator.
    ///
    /// With the sampler enabled this must run inside a Tokio runtime, since
    /// the sampler is spawned as a task.
    pub fn build(self) -> Result<Orchestrator> {
        let cfg = self.config;
        let seed = self
            .seed
            .or(cfg.orchestrator.seed)
            .unwrap_or_else(|| rand::thread_rng().r#gen());
        let mut rng = StdRng::seed_from_u64(seed);

        let (status_sink, status_rx) = status_channel(cfg.orchestrator.status_channel_ceiling);

        let (sampler, snapshot_rx) = if cfg.sampler.enabled {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(ProcsyncError::Other(anyhow::anyhow!(
                    "the resource sampler needs a Tokio runtime; build inside one or disable [sampler]"
                )));
            }
            let source = match self.metrics_source {
                Some(source) => source,
                None => Box::new(SystemMetricsSource::new(cfg.sampler.disk_mount.clone())),
            };
            let (tx, rx) = mpsc::unbounded_channel();
            let handle = ResourceSampler::new(source, cfg.sampler.interval(), cfg.sampler.read_timeout())
                .spawn(tx);
            (Some(handle), Some(rx))
        } else {
            (None, None)
        };

        let core = OrchestratorCore::new(
            cfg.event_log.capacity,
            cfg.sampler.stats_log_probability,
            rng.r#gen(),
        );

        info!(
            seed,
            max_workers = cfg.orchestrator.max_workers,
            sampler = cfg.sampler.enabled,
            "orchestrator ready"
        );

        Ok(Orchestrator {
            core,
            workers: HashMap::new(),
            status_sink,
            status_rx,
            snapshot_rx,
            sampler,
            work_factory: self.work_factory.unwrap_or_else(simulated_work_factory),
            max_workers: cfg.orchestrator.max_workers,
            poll_interval: cfg.orchestrator.poll_interval(),
            next_id: 0,
            rng,
            log_cursor: None,
        })
    }
}

/// Authoritative lifecycle manager of a set of workers.
///
/// Dropping it requests termination of every live worker and stops the
/// sampler; use [`Orchestrator::shutdown`] to also wait for them.
pub struct Orchestrator {
    core: OrchestratorCore,
    workers: HashMap<WorkerId, LiveWorker>,
    status_sink: StatusSink,
    status_rx: StatusReceiver,
    snapshot_rx: Option<mpsc::UnboundedReceiver<ResourceSnapshot>>,
    sampler: Option<SamplerHandle>,
    work_factory: WorkFactory,
    max_workers: usize,
    poll_interval: Duration,
    next_id: WorkerId,
    rng: StdRng,
    log_cursor: Option<u64>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("core", &self.core)
            .field("max_workers", &self.max_workers)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start a new worker and return its id.
    pub fn spawn(&mut self, config: WorkerConfig) -> Result<WorkerId> {
        if self.at_capacity() {
            return Err(ProcsyncError::ResourceExhausted(format!(
                "worker limit of {} reached",
                self.max_workers
            )));
        }

        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| ProcsyncError::ResourceExhausted("worker ids exhausted".to_string()))?;

        let work_kind = match config.work_kind {
            Some(kind) => kind,
            None => PICKABLE_KINDS[self.rng.gen_range(0..PICKABLE_KINDS.len())],
        };
        let spec = WorkerSpec {
            id,
            work_kind,
            speed: config.speed,
            priority: config.priority,
            total_units: config.total_units.max(1),
            unit_delay: config.unit_delay,
        };
        let work = (self.work_factory)(WorkContext {
            worker_id: id,
            seed: self.rng.r#gen(),
            log_probability: config.log_probability,
        });

        let (controller, listener) = signal_channel();
        let status = self.status_sink.sender_for(id);

        self.core
            .register(WorkerRecord::new(id, work_kind, config.speed, config.priority));

        let thread = match Worker::new(spec, listener, status, work).spawn() {
            Ok(thread) => thread,
            Err(err) => {
                self.core.discard(id);
                warn!(worker_id = id, error = %err, "worker thread could not be started");
                return Err(err);
            }
        };
        self.core.mark_running(id)?;

        self.workers.insert(
            id,
            LiveWorker {
                controller,
                thread: Some(thread),
            },
        );

        info!(
            worker_id = id,
            kind = %work_kind,
            speed = %config.speed,
            priority = %config.priority,
            "spawned worker"
        );
        Ok(id)
    }

    /// Ask a worker to stop at its next pause point.
    pub fn pause(&mut self, id: WorkerId) -> Result<ControlOutcome> {
        self.core.ensure_controllable(id, WorkerState::Paused)?;
        let changed = self.controller(id)?.pause();
        if changed {
            debug!(worker_id = id, "pause requested");
        }
        Ok(applied_or_unchanged(changed))
    }

    /// Clear a worker's pause request.
    pub fn resume(&mut self, id: WorkerId) -> Result<ControlOutcome> {
        self.core.ensure_controllable(id, WorkerState::Running)?;
        let changed = self.controller(id)?.resume();
        if changed {
            debug!(worker_id = id, "resume requested");
        }
        Ok(applied_or_unchanged(changed))
    }

    /// Request termination. Returns immediately; the record turns
    /// `Terminated` once the worker's final event has been polled.
    pub fn terminate(&mut self, id: WorkerId) -> Result<ControlOutcome> {
        if !self.core.request_termination(id)? {
            return Ok(ControlOutcome::AlreadyTerminal);
        }
        let changed = self.controller(id)?.terminate();
        if changed {
            self.core
                .log(LogLevel::Info, format!("Termination requested for worker {id}"));
        }
        Ok(applied_or_unchanged(changed))
    }

    /// Terminate every non-terminal worker. Returns how many were newly
    /// signalled.
    pub fn terminate_all(&mut self) -> usize {
        self.for_each_live(|orch, id| orch.terminate(id))
    }

    pub fn pause_all(&mut self) -> usize {
        self.for_each_live(|orch, id| orch.pause(id))
    }

    pub fn resume_all(&mut self) -> usize {
        self.for_each_live(|orch, id| orch.resume(id))
    }

    fn for_each_live(
        &mut self,
        mut op: impl FnMut(&mut Self, WorkerId) -> Result<ControlOutcome>,
    ) -> usize {
        let mut applied = 0;
        for id in self.core.table().live_ids() {
            match op(self, id) {
                Ok(ControlOutcome::Applied) => applied += 1,
                Ok(_) => {}
                Err(err) => debug!(worker_id = id, error = %err, "bulk control skipped worker"),
            }
        }
        applied
    }

    /// Drain everything queued by workers and the sampler without waiting.
    pub fn poll(&mut self) -> PollReport {
        let mut changed = BTreeSet::new();
        for event in self.status_rx.drain() {
            let id = event.worker_id;
            if self.core.apply_status(event) {
                changed.insert(id);
            }
        }

        let mut latest = None;
        if let Some(rx) = self.snapshot_rx.as_mut() {
            while let Ok(snapshot) = rx.try_recv() {
                self.core.apply_snapshot(snapshot.clone());
                latest = Some(snapshot);
            }
        }

        self.join_finished();

        let new_log_entries = self.core.entries_since(self.log_cursor);
        if let Some(last) = new_log_entries.last() {
            self.log_cursor = Some(last.seq);
        }

        PollReport {
            changed_workers: changed.into_iter().collect(),
            new_log_entries,
            latest_resource_snapshot: latest,
        }
    }

    /// Join the threads of terminal workers that have already exited.
    fn join_finished(&mut self) {
        for (&id, live) in self.workers.iter_mut() {
            let terminal = self.core.table().get(id).is_some_and(|r| r.is_terminal());
            if !terminal {
                continue;
            }
            let finished = live.thread.as_ref().is_some_and(|t| t.is_finished());
            if !finished {
                continue;
            }
            if let Some(thread) = live.thread.take() {
                match thread.join() {
                    Ok(exit) => debug!(worker_id = id, ?exit, "worker thread joined"),
                    Err(_) => warn!(worker_id = id, "worker thread ended with an uncaught panic"),
                }
            }
        }
    }

    /// Copy of every record plus the latest resource snapshot.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            workers: self.core.table().iter().cloned().collect(),
            resources: self.core.latest_snapshot().cloned(),
        }
    }

    pub fn worker(&self, id: WorkerId) -> Result<WorkerRecord> {
        self.core
            .table()
            .get(id)
            .cloned()
            .ok_or(ProcsyncError::UnknownWorker(id))
    }

    /// Remove terminal records, freeing their capacity.
    pub fn reap(&mut self) -> Vec<WorkerRecord> {
        self.join_finished();
        let reaped = self.core.reap();
        for record in &reaped {
            // A thread still winding down after its final event is detached.
            self.workers.remove(&record.id);
        }
        if !reaped.is_empty() {
            debug!(count = reaped.len(), "reaped terminal workers");
        }
        reaped
    }

    /// Poll on the configured cadence until every worker is terminal or
    /// `timeout` elapses. Returns everything observed on the way.
    pub async fn drain_until_idle(&mut self, timeout: Duration) -> PollReport {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = self.poll();

        while !self.is_idle() {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!(
                    live = self.core.table().live_count(),
                    ?timeout,
                    "workers still running after drain timeout"
                );
                break;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
            report.merge(self.poll());
        }

        report
    }

    /// Terminate everything, wait up to `timeout` for the workers and stop
    /// the sampler.
    pub async fn shutdown(&mut self, timeout: Duration) -> PollReport {
        let signalled = self.terminate_all();
        info!(signalled, "shutting down orchestrator");
        let report = self.drain_until_idle(timeout).await;
        if let Some(sampler) = self.sampler.take() {
            sampler.shutdown().await;
        }
        self.snapshot_rx = None;
        report
    }

    pub fn is_idle(&self) -> bool {
        self.core.is_idle()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Whether the table holds `max_workers` records. Terminal records count
    /// until they are reaped.
    pub fn at_capacity(&self) -> bool {
        self.core.table().len() >= self.max_workers
    }

    pub fn event_log(&self) -> &EventLog {
        self.core.event_log()
    }

    fn controller(&self, id: WorkerId) -> Result<&SignalController> {
        self.workers
            .get(&id)
            .map(|w| &w.controller)
            .ok_or(ProcsyncError::UnknownWorker(id))
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let mut signalled = 0;
        for live in self.workers.values() {
            if live.controller.terminate() {
                signalled += 1;
            }
        }
        if signalled > 0 {
            debug!(signalled, "orchestrator dropped; terminating live workers");
        }
    }
}

fn applied_or_unchanged(changed: bool) -> ControlOutcome {
    if changed {
        ControlOutcome::Applied
    } else {
        ControlOutcome::Unchanged
    }
}

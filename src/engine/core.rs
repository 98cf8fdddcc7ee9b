// src/engine/core.rs

//! Pure orchestrator core.
//!
//! [`OrchestratorCore`] owns the state table and the event log and applies
//! everything that changes them: status events from workers, resource
//! snapshots from the sampler, and control requests from callers. It has no
//! threads, channels or Tokio types, so every lifecycle rule can be unit
//! tested by feeding it hand-made events.
//!
//! The IO side (worker threads, signal controllers, the sampler task) lives
//! in [`crate::engine::orchestrator`].

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::errors::{ProcsyncError, Result};
use crate::event_log::{EventLog, LogEntry, LogLevel};
use crate::sampler::ResourceSnapshot;
use crate::types::WorkerId;
use crate::worker::{StatusEvent, StatusKind, WorkerState};

use super::table::{StateTable, WorkerRecord};

#[derive(Debug)]
pub struct OrchestratorCore {
    table: StateTable,
    log: EventLog,
    latest_snapshot: Option<ResourceSnapshot>,
    /// Highest status `seq` applied per worker.
    last_seq: HashMap<WorkerId, u64>,
    stats_rng: StdRng,
    stats_log_probability: f64,
}

impl OrchestratorCore {
    pub fn new(log_capacity: usize, stats_log_probability: f64, seed: u64) -> Self {
        Self {
            table: StateTable::new(),
            log: EventLog::new(log_capacity),
            latest_snapshot: None,
            last_seq: HashMap::new(),
            stats_rng: StdRng::seed_from_u64(seed),
            stats_log_probability: stats_log_probability.clamp(0.0, 1.0),
        }
    }

    pub fn table(&self) -> &StateTable {
        &self.table
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn latest_snapshot(&self) -> Option<&ResourceSnapshot> {
        self.latest_snapshot.as_ref()
    }

    /// True when no record is in a non-terminal state.
    pub fn is_idle(&self) -> bool {
        self.table.live_count() == 0
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) -> u64 {
        self.log.append(level, message)
    }

    pub fn entries_since(&self, after: Option<u64>) -> Vec<LogEntry> {
        self.log.entries_since(after)
    }

    /// Add a record in the `Created` state.
    pub fn register(&mut self, record: WorkerRecord) {
        debug!(worker_id = record.id, "registering worker record");
        self.table.insert(record);
    }

    /// Drop a record whose worker never started.
    pub fn discard(&mut self, id: WorkerId) -> Option<WorkerRecord> {
        self.last_seq.remove(&id);
        self.table.remove(id)
    }

    /// `Created -> Running`, once the worker thread is up.
    pub fn mark_running(&mut self, id: WorkerId) -> Result<()> {
        let record = self
            .table
            .get_mut(id)
            .ok_or(ProcsyncError::UnknownWorker(id))?;
        let from = record.state;
        record.state = from
            .transition(WorkerState::Running)
            .ok_or(ProcsyncError::InvalidTransition {
                id,
                from,
                to: WorkerState::Running,
            })?;
        Ok(())
    }

    /// Check that a pause (`to = Paused`) or resume (`to = Running`) request
    /// may be sent to `id`.
    ///
    /// Only terminal records are refused; whether the flag actually changes
    /// is up to the signal controller.
    pub fn ensure_controllable(&self, id: WorkerId, to: WorkerState) -> Result<()> {
        let record = self.table.get(id).ok_or(ProcsyncError::UnknownWorker(id))?;
        if record.is_terminal() {
            return Err(ProcsyncError::InvalidTransition {
                id,
                from: record.state,
                to,
            });
        }
        Ok(())
    }

    /// Note a terminate request. Returns `false` if the record is already
    /// terminal and nothing should be signalled.
    pub fn request_termination(&mut self, id: WorkerId) -> Result<bool> {
        let record = self
            .table
            .get_mut(id)
            .ok_or(ProcsyncError::UnknownWorker(id))?;
        if record.is_terminal() {
            return Ok(false);
        }
        record.termination_requested = true;
        Ok(true)
    }

    /// Apply one status event. Returns `true` if the worker's record changed.
    ///
    /// Events for unknown workers, replays of an already applied `seq`, and
    /// anything arriving after a terminal event are ignored with a warning.
    pub fn apply_status(&mut self, event: StatusEvent) -> bool {
        let id = event.worker_id;

        let Some(record) = self.table.get_mut(id) else {
            warn!(worker_id = id, seq = event.seq, "status event for unknown worker; ignoring");
            return false;
        };

        if let Some(&last) = self.last_seq.get(&id) {
            if event.seq <= last {
                warn!(worker_id = id, seq = event.seq, last, "stale status event; ignoring");
                return false;
            }
        }
        self.last_seq.insert(id, event.seq);

        if record.is_terminal() {
            warn!(
                worker_id = id,
                state = %record.state,
                kind = ?event.kind,
                "status event after terminal state; ignoring"
            );
            return false;
        }

        match event.kind {
            StatusKind::Progress(percent) => {
                let percent = percent.min(100);
                if percent > record.progress {
                    record.progress = percent;
                    true
                } else {
                    false
                }
            }
            StatusKind::Log { level, message } => {
                self.log.append(level, message);
                false
            }
            StatusKind::Paused => {
                let changed = transition(record, WorkerState::Paused);
                if changed {
                    self.log.append(LogLevel::Info, format!("Worker {id} paused"));
                }
                changed
            }
            StatusKind::Resumed => {
                let changed = transition(record, WorkerState::Running);
                if changed {
                    self.log.append(LogLevel::Info, format!("Worker {id} resumed"));
                }
                changed
            }
            StatusKind::Completed { elapsed } => {
                let changed = transition(record, WorkerState::Completed);
                if changed {
                    record.progress = 100;
                    record.duration = Some(elapsed);
                    record.ended_at = Some(event.timestamp);
                    self.log.append(
                        LogLevel::Info,
                        format!("Worker {id} completed in {:.2}s", elapsed.as_secs_f64()),
                    );
                }
                changed
            }
            StatusKind::Terminated => {
                let changed = transition(record, WorkerState::Terminated);
                if changed {
                    record.ended_at = Some(event.timestamp);
                    self.log.append(LogLevel::Info, format!("Worker {id} terminated"));
                }
                changed
            }
            StatusKind::Error { message } => {
                let changed = transition(record, WorkerState::Failed);
                if changed {
                    record.ended_at = Some(event.timestamp);
                    self.log
                        .append(LogLevel::Error, format!("Worker {id} failed: {message}"));
                    record.last_error = Some(message);
                }
                changed
            }
        }
    }

    /// Record a resource snapshot as the latest one.
    pub fn apply_snapshot(&mut self, snapshot: ResourceSnapshot) {
        if !snapshot.unavailable.is_empty() {
            let detail = snapshot
                .unavailable
                .iter()
                .map(|u| format!("{} ({})", u.metric, u.reason))
                .collect::<Vec<_>>()
                .join(", ");
            self.log.append(
                LogLevel::Warn,
                format!("Resource readings unavailable: {detail}"),
            );
        }

        if self.stats_rng.gen_bool(self.stats_log_probability) {
            self.log.append(
                LogLevel::Info,
                format!(
                    "System Stats - CPU: {}, Memory: {}, Disk: {}",
                    percent_or_na(snapshot.cpu_pct),
                    percent_or_na(snapshot.mem_pct),
                    percent_or_na(snapshot.disk_pct),
                ),
            );
        }

        self.latest_snapshot = Some(snapshot);
    }

    /// Remove every terminal record (their ids stay unknown from now on).
    pub fn reap(&mut self) -> Vec<WorkerRecord> {
        let reaped = self.table.remove_terminal();
        for record in &reaped {
            self.last_seq.remove(&record.id);
        }
        reaped
    }
}

fn transition(record: &mut WorkerRecord, next: WorkerState) -> bool {
    match record.state.transition(next) {
        Some(state) => {
            record.state = state;
            true
        }
        None => {
            warn!(
                worker_id = record.id,
                from = %record.state,
                to = %next,
                "status event implies an invalid transition; ignoring"
            );
            false
        }
    }
}

fn percent_or_na(value: Option<f32>) -> String {
    match value {
        Some(v) => format!("{v:.1}%"),
        None => "n/a".to_string(),
    }
}

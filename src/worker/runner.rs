// src/worker/runner.rs

//! The worker loop and the thread that hosts it.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, warn};

use crate::errors::{ProcsyncError, Result};
use crate::event_log::LogLevel;
use crate::types::{Priority, SpeedFactor, WorkKind, WorkerId};
use crate::worker::priority::apply_priority;
use crate::worker::signal::{SignalListener, Wakeup};
use crate::worker::status::{StatusKind, StatusSender};
use crate::worker::work::WorkSimulator;

/// Upper bound on the pacing wait of one unit, however slow the worker runs.
pub const MAX_PACED_DELAY: Duration = Duration::from_secs(60);

/// Fully resolved parameters of one worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub id: WorkerId,
    pub work_kind: WorkKind,
    pub speed: SpeedFactor,
    pub priority: Priority,
    pub total_units: u32,
    /// Pacing delay of one unit at speed 1x.
    pub unit_delay: Duration,
}

impl WorkerSpec {
    /// Pacing delay of one unit at this worker's speed.
    ///
    /// Saturates at [`MAX_PACED_DELAY`] for speed factors close to zero.
    pub fn paced_delay(&self) -> Duration {
        let secs = self.unit_delay.as_secs_f64() / self.speed.get();
        if !secs.is_finite() || secs >= MAX_PACED_DELAY.as_secs_f64() {
            return MAX_PACED_DELAY;
        }
        self.unit_delay.div_f64(self.speed.get())
    }
}

/// How a worker left its loop. Mirrors the terminal status event it sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Completed,
    Terminated,
    Failed,
    /// The status consumer disappeared; nobody is listening any more.
    Disconnected,
}

/// A running simulation unit.
///
/// Owns its progress counter; the orchestrator only ever learns about it
/// through the status events this type sends.
pub struct Worker {
    spec: WorkerSpec,
    signals: SignalListener,
    status: StatusSender,
    work: Box<dyn WorkSimulator>,
    units_done: u32,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("spec", &self.spec)
            .field("units_done", &self.units_done)
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(
        spec: WorkerSpec,
        signals: SignalListener,
        status: StatusSender,
        work: Box<dyn WorkSimulator>,
    ) -> Self {
        Self {
            spec,
            signals,
            status,
            work,
            units_done: 0,
        }
    }

    /// Start the worker on a dedicated, named OS thread.
    ///
    /// A panic inside the worker body is caught and reported as an `Error`
    /// status event, so the orchestrator always sees a terminal event.
    pub fn spawn(self) -> Result<JoinHandle<WorkerExit>> {
        let id = self.spec.id;
        thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || self.run_guarded())
            .map_err(|e| {
                ProcsyncError::ResourceExhausted(format!("could not start thread for worker {id}: {e}"))
            })
    }

    fn run_guarded(self) -> WorkerExit {
        let id = self.spec.id;
        let _span = info_span!("worker", id).entered();
        // Keep a second sender around in case the worker body unwinds and
        // takes its own sender down with it.
        let mut fallback = self.status.clone_for_fault();

        match panic::catch_unwind(AssertUnwindSafe(move || self.run())) {
            Ok(exit) => exit,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(worker_id = id, %message, "worker panicked");
                fallback.send(StatusKind::Error {
                    message: format!("panic: {message}"),
                });
                WorkerExit::Failed
            }
        }
    }

    /// Execute until a terminal state is reached.
    pub fn run(mut self) -> WorkerExit {
        let id = self.spec.id;
        let started = Instant::now();

        info!(
            worker_id = id,
            kind = %self.spec.work_kind,
            speed = %self.spec.speed,
            priority = %self.spec.priority,
            "worker started"
        );
        let started_msg = format!(
            "Worker {id} started (Priority: {}, Speed: {}, Kind: {})",
            self.spec.priority, self.spec.speed, self.spec.work_kind
        );
        if !self.status.log(LogLevel::Info, started_msg) {
            return WorkerExit::Disconnected;
        }

        if let Err(err) = apply_priority(self.spec.priority) {
            warn!(worker_id = id, error = %err, "could not apply priority; continuing");
            let msg = format!("Worker {id} priority setting failed: {err}");
            if !self.status.log(LogLevel::Warn, msg) {
                return WorkerExit::Disconnected;
            }
        }

        loop {
            if self.units_done >= self.spec.total_units {
                let elapsed = started.elapsed();
                debug!(worker_id = id, ?elapsed, "worker completed");
                return self.finish(StatusKind::Completed { elapsed }, WorkerExit::Completed);
            }

            if self.signals.terminate_requested() {
                return self.finish(StatusKind::Terminated, WorkerExit::Terminated);
            }

            if self.signals.pause_requested() {
                debug!(worker_id = id, progress = self.progress(), "worker pausing");
                if !self.status.send(StatusKind::Paused) {
                    return WorkerExit::Disconnected;
                }
                match self.signals.wait_while_paused() {
                    Wakeup::Terminate => {
                        return self.finish(StatusKind::Terminated, WorkerExit::Terminated);
                    }
                    Wakeup::Resumed | Wakeup::Elapsed => {
                        debug!(worker_id = id, "worker resumed");
                        if !self.status.send(StatusKind::Resumed) {
                            return WorkerExit::Disconnected;
                        }
                    }
                }
                // Re-check terminate/pause before doing any work.
                continue;
            }

            match self.perform_unit() {
                Ok(None) => return WorkerExit::Disconnected,
                Ok(Some(Wakeup::Terminate)) => {
                    return self.finish(StatusKind::Terminated, WorkerExit::Terminated);
                }
                Ok(Some(_)) => {}
                Err(err) => {
                    let fault = ProcsyncError::WorkerFault {
                        id,
                        message: format!("{err:#}"),
                    };
                    error!(worker_id = id, error = %fault, "worker fault");
                    return self.finish(
                        StatusKind::Error {
                            message: format!("{err:#}"),
                        },
                        WorkerExit::Failed,
                    );
                }
            }

            self.units_done += 1;
            if !self.status.send(StatusKind::Progress(self.progress())) {
                return WorkerExit::Disconnected;
            }
        }
    }

    /// One unit: real work, then the pacing delay.
    ///
    /// Everything the unit allocates is dropped before this returns. `None`
    /// means the status consumer is gone.
    fn perform_unit(&mut self) -> anyhow::Result<Option<Wakeup>> {
        let kind = self.work.next_kind(self.spec.work_kind);
        self.work.perform(kind)?;

        if self.work.should_log_unit() {
            let msg = format!("Worker {} performing {kind} work", self.spec.id);
            if !self.status.log(LogLevel::Info, msg) {
                return Ok(None);
            }
        }

        Ok(Some(self.signals.sleep(self.spec.paced_delay())))
    }

    fn progress(&self) -> u8 {
        let total = u64::from(self.spec.total_units.max(1));
        let done = u64::from(self.units_done).min(total);
        (done * 100 / total) as u8
    }

    /// Send the terminal event. Nothing is sent after this.
    fn finish(mut self, kind: StatusKind, exit: WorkerExit) -> WorkerExit {
        // Release the simulator before announcing the exit.
        drop(std::mem::replace(&mut self.work, Box::new(Exhausted)));
        if self.status.send(kind) {
            exit
        } else {
            WorkerExit::Disconnected
        }
    }
}

/// Placeholder left behind once a worker has released its simulator.
struct Exhausted;

impl WorkSimulator for Exhausted {
    fn next_kind(&mut self, kind: WorkKind) -> WorkKind {
        kind
    }

    fn perform(&mut self, _kind: WorkKind) -> anyhow::Result<()> {
        anyhow::bail!("worker already finished")
    }

    fn should_log_unit(&mut self) -> bool {
        false
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

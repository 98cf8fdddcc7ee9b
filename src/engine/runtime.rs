// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::types::WorkerId;

use super::orchestrator::{Orchestrator, PollReport, WorkerConfig};

/// Requests a presentation layer can send to a running [`Runtime`].
#[derive(Debug, Clone)]
pub enum ControlCommand {
    /// Start a worker. Terminal records are reaped first when the table is
    /// full, so finished workers never block a new one.
    Spawn(WorkerConfig),
    Pause(WorkerId),
    Resume(WorkerId),
    Terminate(WorkerId),
    TerminateAll,
    PauseAll,
    ResumeAll,
    /// Drop terminal records from the table.
    Reap,
    /// Terminate everything, drain, and stop the runtime.
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Stop once every worker is terminal.
    pub exit_when_idle: bool,
    /// How long shutdown waits for workers to acknowledge terminate.
    pub shutdown_timeout: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: false,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Drives an [`Orchestrator`] on its poll cadence and applies
/// [`ControlCommand`]s as they arrive.
///
/// Every poll result is forwarded to the optional observer channel, which is
/// how a UI (or the headless driver) learns about progress and new log
/// entries.
pub struct Runtime {
    orchestrator: Orchestrator,
    command_rx: mpsc::Receiver<ControlCommand>,
    observer: Option<mpsc::UnboundedSender<PollReport>>,
    options: RuntimeOptions,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("orchestrator", &self.orchestrator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        orchestrator: Orchestrator,
        command_rx: mpsc::Receiver<ControlCommand>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            orchestrator,
            command_rx,
            observer: None,
            options,
        }
    }

    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<PollReport>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Main loop.
    ///
    /// - Applies commands as they arrive (commands win over a due tick).
    /// - Polls the orchestrator every poll interval.
    /// - Ends on `Shutdown`, when idle with `exit_when_idle`, or when the
    ///   command channel closes without `exit_when_idle`.
    ///
    /// Always shuts the orchestrator down before returning it.
    pub async fn run(mut self) -> Result<Orchestrator> {
        info!(
            poll_interval = ?self.orchestrator.poll_interval(),
            exit_when_idle = self.options.exit_when_idle,
            "runtime started"
        );

        let mut ticker = tokio::time::interval(self.orchestrator.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv(), if commands_open => match cmd {
                    Some(ControlCommand::Shutdown) => {
                        info!("shutdown requested");
                        break;
                    }
                    Some(cmd) => self.execute_command(cmd),
                    None => {
                        commands_open = false;
                        if !self.options.exit_when_idle {
                            info!("command channel closed; stopping runtime");
                            break;
                        }
                        debug!("command channel closed; running until idle");
                    }
                },
                _ = ticker.tick() => {
                    let report = self.orchestrator.poll();
                    self.publish(report);
                    if self.options.exit_when_idle && self.orchestrator.is_idle() {
                        info!("all workers finished");
                        break;
                    }
                }
            }
        }

        let report = self
            .orchestrator
            .shutdown(self.options.shutdown_timeout)
            .await;
        self.publish(report);

        info!("runtime exiting");
        Ok(self.orchestrator)
    }

    fn execute_command(&mut self, cmd: ControlCommand) {
        debug!(?cmd, "runtime received command");
        let orch = &mut self.orchestrator;
        let result = match cmd {
            ControlCommand::Spawn(config) => {
                if orch.at_capacity() {
                    let freed = orch.reap().len();
                    debug!(freed, "table full; reaped terminal workers before spawn");
                }
                orch.spawn(config).map(|id| {
                    debug!(worker_id = id, "spawned via command");
                })
            }
            ControlCommand::Pause(id) => orch.pause(id).map(|outcome| {
                debug!(worker_id = id, ?outcome, "pause");
            }),
            ControlCommand::Resume(id) => orch.resume(id).map(|outcome| {
                debug!(worker_id = id, ?outcome, "resume");
            }),
            ControlCommand::Terminate(id) => orch.terminate(id).map(|outcome| {
                debug!(worker_id = id, ?outcome, "terminate");
            }),
            ControlCommand::TerminateAll => {
                let n = orch.terminate_all();
                debug!(signalled = n, "terminate all");
                Ok(())
            }
            ControlCommand::PauseAll => {
                let n = orch.pause_all();
                debug!(signalled = n, "pause all");
                Ok(())
            }
            ControlCommand::ResumeAll => {
                let n = orch.resume_all();
                debug!(signalled = n, "resume all");
                Ok(())
            }
            ControlCommand::Reap => {
                let n = orch.reap().len();
                debug!(reaped = n, "reap");
                Ok(())
            }
            ControlCommand::Shutdown => Ok(()),
        };

        if let Err(err) = result {
            warn!(error = %err, "control command rejected");
        }
    }

    fn publish(&mut self, report: PollReport) {
        if report.is_empty() {
            return;
        }
        if let Some(observer) = &self.observer {
            if observer.send(report).is_err() {
                debug!("poll observer dropped; no longer publishing");
                self.observer = None;
            }
        }
    }
}

// src/worker/state.rs

//! Worker lifecycle state machine.

use serde::Serialize;

/// Lifecycle state of a worker.
///
/// ```text
/// Created -> Running -> { Paused <-> Running } -> { Completed | Terminated | Failed }
/// ```
///
/// `Completed`, `Terminated` and `Failed` are terminal: nothing leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Record exists but the worker thread has not been started yet.
    Created,
    Running,
    /// Blocked at its pause point; consumes no CPU.
    Paused,
    /// Finished every unit of work.
    Completed,
    /// Stopped because terminate was requested.
    Terminated,
    /// Stopped because of an internal fault.
    Failed,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerState::Completed | WorkerState::Terminated | WorkerState::Failed
        )
    }

    /// The transition table. Every state change in the crate goes through here.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;

        match (self, next) {
            (Created, Running) => true,
            // A worker that never got to run can still be reported as failed.
            (Created, Failed) => true,
            (Running, Paused) => true,
            (Running, Completed | Terminated | Failed) => true,
            (Paused, Running) => true,
            // Terminate (or a fault) wakes a paused worker straight into a
            // terminal state.
            (Paused, Terminated | Failed) => true,
            _ => false,
        }
    }

    /// Return `next` if the transition is permitted.
    pub fn transition(self, next: WorkerState) -> Option<WorkerState> {
        self.can_transition_to(next).then_some(next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Created => "Created",
            WorkerState::Running => "Running",
            WorkerState::Paused => "Paused",
            WorkerState::Completed => "Completed",
            WorkerState::Terminated => "Terminated",
            WorkerState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

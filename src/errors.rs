// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::WorkerId;
use crate::worker::WorkerState;

#[derive(Error, Debug)]
pub enum ProcsyncError {
    #[error("Unknown worker: {0}")]
    UnknownWorker(WorkerId),

    #[error("Invalid transition for worker {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: WorkerId,
        from: WorkerState,
        to: WorkerState,
    },

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Raised inside a worker only; the orchestrator turns it into an
    /// `Error` status event and a `Failed` record.
    #[error("Worker {id} fault: {message}")]
    WorkerFault { id: WorkerId, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProcsyncError>;

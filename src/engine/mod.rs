// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`table`] holds the worker state table.
//! - [`core`] is the pure, synchronous state machine that applies status
//!   events, snapshots and control requests to the table and event log.
//! - [`orchestrator`] is the IO shell: worker threads, signal controllers,
//!   channels and the sampler task.
//! - [`runtime`] drives an orchestrator on its poll cadence from a command
//!   channel.

pub mod core;
pub mod orchestrator;
pub mod runtime;
pub mod table;

pub use self::core::OrchestratorCore;
pub use orchestrator::{
    ControlOutcome, Orchestrator, OrchestratorBuilder, PollReport, TableSnapshot, WorkerConfig,
};
pub use runtime::{ControlCommand, Runtime, RuntimeOptions};
pub use table::{StateTable, WorkerRecord};

// src/worker/mod.rs

//! Simulated workers and the two channels that connect them to the
//! orchestrator.
//!
//! - [`state`] holds the lifecycle state machine shared by every layer.
//! - [`signal`] is the single-writer pause/terminate control surface.
//! - [`status`] is the many-producer/single-consumer event path back to the
//!   orchestrator.
//! - [`work`] provides the `WorkSimulator` trait and the default simulated
//!   CPU / memory / IO work.
//! - [`priority`] applies the OS scheduling hint for a worker thread.
//! - [`runner`] contains the worker loop itself.

pub mod priority;
pub mod runner;
pub mod signal;
pub mod state;
pub mod status;
pub mod work;

pub use runner::{MAX_PACED_DELAY, Worker, WorkerExit, WorkerSpec};
pub use signal::{SignalController, SignalListener, Wakeup, signal_channel};
pub use state::WorkerState;
pub use status::{StatusEvent, StatusKind, StatusReceiver, StatusSender, StatusSink, status_channel};
pub use work::{SimulatedWork, WorkContext, WorkFactory, WorkSimulator, simulated_work_factory};

#![allow(dead_code)]

pub use procsync_test_utils::{builders, fake_work, init_tracing, poll_until, with_timeout};

use std::time::Duration;

use chrono::Local;
use procsync::types::WorkerId;
use procsync::worker::{StatusEvent, StatusKind};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Generous upper bound for anything a worker should do "soon".
pub const SOON: Duration = Duration::from_secs(3);

/// Hand-made status event.
pub fn event(worker_id: WorkerId, seq: u64, kind: StatusKind) -> StatusEvent {
    StatusEvent {
        worker_id,
        seq,
        kind,
        timestamp: Local::now(),
    }
}

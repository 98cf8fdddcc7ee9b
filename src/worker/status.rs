// src/worker/status.rs

//! Worker -> orchestrator status delivery.
//!
//! The channel is an unbounded tokio mpsc: workers run on plain threads and
//! must never stall mid-simulation, and `UnboundedSender::send` never blocks.
//! Each worker owns exactly one [`StatusSender`], so events from one worker
//! arrive in the order it produced them. Nothing orders events across
//! workers.
//!
//! Memory is bounded in practice by the producers: a worker emits at most one
//! event per unit of work plus a handful of lifecycle events, and the
//! orchestrator drains on a fixed cadence. A shared depth counter still
//! tracks undelivered events and logs one warning each time the configured
//! ceiling is crossed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::event_log::LogLevel;
use crate::types::WorkerId;

/// Payload of a status event.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusKind {
    /// Progress after a completed unit, in percent (0..=100).
    Progress(u8),
    /// Free-form message for the event log.
    Log { level: LogLevel, message: String },
    /// The worker reached its pause point and is now blocked.
    Paused,
    /// The worker left its pause point.
    Resumed,
    /// All units done.
    Completed { elapsed: Duration },
    /// Terminate was observed; the worker has exited.
    Terminated,
    /// Unrecoverable internal fault; the worker has exited.
    Error { message: String },
}

impl StatusKind {
    /// Terminal kinds are always the last event a worker sends.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusKind::Completed { .. } | StatusKind::Terminated | StatusKind::Error { .. }
        )
    }
}

/// Immutable status event. Ownership moves to the consumer on delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub worker_id: WorkerId,
    /// Per-worker production sequence number, starting at 0.
    pub seq: u64,
    pub kind: StatusKind,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug)]
struct ChannelDepth {
    pending: AtomicUsize,
    ceiling: usize,
    over_ceiling: AtomicBool,
}

impl ChannelDepth {
    fn incr(&self) {
        let depth = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if depth > self.ceiling && !self.over_ceiling.swap(true, Ordering::Relaxed) {
            warn!(
                depth,
                ceiling = self.ceiling,
                "status channel exceeded its ceiling; consumer is falling behind"
            );
        }
    }

    fn decr(&self, n: usize) {
        let before = self.pending.fetch_sub(n, Ordering::Relaxed);
        if before.saturating_sub(n) <= self.ceiling
            && self.over_ceiling.swap(false, Ordering::Relaxed)
        {
            info!(ceiling = self.ceiling, "status channel back under its ceiling");
        }
    }
}

/// Create the status channel.
///
/// `ceiling` is the undelivered-event count above which a warning is
/// logged. It never causes events to be dropped or senders to block.
pub fn status_channel(ceiling: usize) -> (StatusSink, StatusReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(ChannelDepth {
        pending: AtomicUsize::new(0),
        ceiling,
        over_ceiling: AtomicBool::new(false),
    });
    (
        StatusSink {
            tx,
            depth: Arc::clone(&depth),
        },
        StatusReceiver { rx, depth },
    )
}

/// Factory for per-worker senders. Held by the orchestrator.
#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
    depth: Arc<ChannelDepth>,
}

impl StatusSink {
    /// Sender bound to `worker_id`, with its own sequence counter.
    pub fn sender_for(&self, worker_id: WorkerId) -> StatusSender {
        StatusSender {
            worker_id,
            next_seq: Arc::new(AtomicU64::new(0)),
            tx: self.tx.clone(),
            depth: Arc::clone(&self.depth),
        }
    }
}

/// The single producer handle owned by one worker.
#[derive(Debug)]
pub struct StatusSender {
    worker_id: WorkerId,
    next_seq: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<StatusEvent>,
    depth: Arc<ChannelDepth>,
}

impl StatusSender {
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Send an event. Never blocks.
    ///
    /// Returns `false` if the consumer is gone; the worker should stop.
    pub fn send(&mut self, kind: StatusKind) -> bool {
        let event = StatusEvent {
            worker_id: self.worker_id,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            kind,
            timestamp: Local::now(),
        };

        // Count before sending so the receiver can never decrement first.
        self.depth.incr();
        if self.tx.send(event).is_err() {
            self.depth.decr(1);
            return false;
        }
        true
    }

    /// Second handle sharing this sender's sequence counter.
    ///
    /// Only used to report a panic after the primary handle has been lost
    /// during unwinding, so the two are never used concurrently.
    pub(crate) fn clone_for_fault(&self) -> StatusSender {
        StatusSender {
            worker_id: self.worker_id,
            next_seq: Arc::clone(&self.next_seq),
            tx: self.tx.clone(),
            depth: Arc::clone(&self.depth),
        }
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) -> bool {
        self.send(StatusKind::Log {
            level,
            message: message.into(),
        })
    }
}

/// The single consumer half. Owned by the orchestrator.
#[derive(Debug)]
pub struct StatusReceiver {
    rx: mpsc::UnboundedReceiver<StatusEvent>,
    depth: Arc<ChannelDepth>,
}

impl StatusReceiver {
    /// Take every event currently in the channel without waiting.
    pub fn drain(&mut self) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        if !events.is_empty() {
            self.depth.decr(events.len());
        }
        events
    }

    /// Number of sent but not yet drained events.
    pub fn pending(&self) -> usize {
        self.depth.pending.load(Ordering::Relaxed)
    }
}

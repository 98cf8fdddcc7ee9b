// src/worker/signal.rs

//! Per-worker control surface.
//!
//! A signal channel is split into two halves:
//!
//! - [`SignalController`] is held by the orchestrator. It is the only type
//!   with setters and it is not `Clone`, so every flag has exactly one writer.
//! - [`SignalListener`] is moved into the worker. It can read the flags and
//!   block until they change, nothing else.
//!
//! The flags themselves are atomics. The mutex/condvar pair exists only so a
//! paused worker can sleep without spinning; writers store the flag first and
//! then notify under the lock, and the worker re-checks the flags under the
//! same lock, so a wakeup cannot be lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct SignalCell {
    paused: AtomicBool,
    terminated: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl SignalCell {
    fn notify(&self) {
        let _guard = self.lock.lock();
        self.wake.notify_all();
    }
}

/// What woke a worker that was waiting on its listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// The pause flag was cleared.
    Resumed,
    /// The terminate flag is set; the worker must exit.
    Terminate,
    /// The requested wait elapsed without a terminate request.
    Elapsed,
}

/// Create a fresh, cleared signal channel.
pub fn signal_channel() -> (SignalController, SignalListener) {
    let cell = Arc::new(SignalCell::default());
    (
        SignalController {
            cell: Arc::clone(&cell),
        },
        SignalListener { cell },
    )
}

/// Orchestrator half of a signal channel.
#[derive(Debug)]
pub struct SignalController {
    cell: Arc<SignalCell>,
}

impl SignalController {
    /// Set the pause flag. Returns `true` if it was previously clear.
    pub fn pause(&self) -> bool {
        let was_paused = self.cell.paused.swap(true, Ordering::SeqCst);
        if !was_paused {
            self.cell.notify();
        }
        !was_paused
    }

    /// Clear the pause flag. Returns `true` if it was previously set.
    pub fn resume(&self) -> bool {
        let was_paused = self.cell.paused.swap(false, Ordering::SeqCst);
        if was_paused {
            self.cell.notify();
        }
        was_paused
    }

    /// Set the terminate flag. It is never cleared again.
    ///
    /// Returns `true` only for the call that actually set it.
    pub fn terminate(&self) -> bool {
        let already = self.cell.terminated.swap(true, Ordering::SeqCst);
        if !already {
            self.cell.notify();
        }
        !already
    }

    pub fn is_paused(&self) -> bool {
        self.cell.paused.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.cell.terminated.load(Ordering::SeqCst)
    }
}

/// Worker half of a signal channel.
#[derive(Debug)]
pub struct SignalListener {
    cell: Arc<SignalCell>,
}

impl SignalListener {
    pub fn pause_requested(&self) -> bool {
        self.cell.paused.load(Ordering::SeqCst)
    }

    pub fn terminate_requested(&self) -> bool {
        self.cell.terminated.load(Ordering::SeqCst)
    }

    /// Block until the pause flag is cleared or terminate is requested.
    ///
    /// Terminate wins if both are observed.
    pub fn wait_while_paused(&self) -> Wakeup {
        let mut guard = self.cell.lock.lock();
        loop {
            if self.terminate_requested() {
                return Wakeup::Terminate;
            }
            if !self.pause_requested() {
                return Wakeup::Resumed;
            }
            self.cell.wake.wait(&mut guard);
        }
    }

    /// Sleep for `duration`, returning early only if terminate is requested.
    ///
    /// Pause requests do not cut the sleep short; they are honoured at the
    /// next check between units.
    pub fn sleep(&self, duration: Duration) -> Wakeup {
        let deadline = Instant::now() + duration;
        let mut guard = self.cell.lock.lock();
        loop {
            if self.terminate_requested() {
                return Wakeup::Terminate;
            }
            if self.cell.wake.wait_until(&mut guard, deadline).timed_out() {
                return if self.terminate_requested() {
                    Wakeup::Terminate
                } else {
                    Wakeup::Elapsed
                };
            }
        }
    }
}

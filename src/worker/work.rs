// src/worker/work.rs

//! Pluggable unit-of-work abstraction.
//!
//! A worker calls [`WorkSimulator::perform`] once per unit. Production code
//! uses [`SimulatedWork`], which burns CPU, allocates memory or sleeps; tests
//! provide their own implementation (instant, scripted to fail, ...).
//!
//! Randomness (which concrete kind a `Mixed` worker runs, whether a unit is
//! logged) comes from a seeded `StdRng` so a whole run is reproducible from
//! the orchestrator seed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{WorkKind, WorkerId};

/// Squares computed by one CPU unit.
const CPU_UNIT_ITERATIONS: u64 = 100_000;
/// Elements allocated by one memory unit.
const MEMORY_UNIT_ELEMENTS: usize = 100_000;
/// Simulated device wait of one IO unit.
const IO_UNIT_WAIT: Duration = Duration::from_millis(10);

/// One unit of simulated work.
///
/// Implementations must release everything they allocate before returning.
/// An `Err` is treated as an unrecoverable fault of the worker.
pub trait WorkSimulator: Send {
    /// Pick the concrete kind for the next unit. `kind` is the worker's
    /// configured kind and may be `Mixed`.
    fn next_kind(&mut self, kind: WorkKind) -> WorkKind;

    /// Perform one unit of `kind` (never `Mixed`).
    fn perform(&mut self, kind: WorkKind) -> Result<()>;

    /// Whether this unit should emit a "performing ... work" log event.
    fn should_log_unit(&mut self) -> bool;
}

/// Per-worker inputs handed to a [`WorkFactory`].
#[derive(Debug, Clone, Copy)]
pub struct WorkContext {
    pub worker_id: WorkerId,
    pub seed: u64,
    pub log_probability: f64,
}

/// Builds the simulator for each spawned worker.
pub type WorkFactory = Arc<dyn Fn(WorkContext) -> Box<dyn WorkSimulator> + Send + Sync>;

/// Default factory producing [`SimulatedWork`].
pub fn simulated_work_factory() -> WorkFactory {
    Arc::new(|ctx: WorkContext| Box::new(SimulatedWork::new(ctx)) as Box<dyn WorkSimulator>)
}

/// CPU / memory / IO work as in the original analyzer.
#[derive(Debug)]
pub struct SimulatedWork {
    rng: StdRng,
    log_probability: f64,
}

impl SimulatedWork {
    pub fn new(ctx: WorkContext) -> Self {
        Self {
            rng: StdRng::seed_from_u64(ctx.seed),
            log_probability: ctx.log_probability.clamp(0.0, 1.0),
        }
    }
}

impl WorkSimulator for SimulatedWork {
    fn next_kind(&mut self, kind: WorkKind) -> WorkKind {
        match kind {
            WorkKind::Mixed => {
                let idx = self.rng.gen_range(0..WorkKind::CONCRETE.len());
                WorkKind::CONCRETE[idx]
            }
            concrete => concrete,
        }
    }

    fn perform(&mut self, kind: WorkKind) -> Result<()> {
        match kind {
            WorkKind::Cpu => {
                let sum = (0..CPU_UNIT_ITERATIONS).fold(0u64, |acc, x| acc.wrapping_add(x * x));
                std::hint::black_box(sum);
            }
            WorkKind::Memory => {
                let buffer = vec![0u64; MEMORY_UNIT_ELEMENTS];
                std::hint::black_box(&buffer);
            }
            WorkKind::Io => std::thread::sleep(IO_UNIT_WAIT),
            WorkKind::Mixed => anyhow::bail!("mixed is not a concrete work kind"),
        }
        Ok(())
    }

    fn should_log_unit(&mut self) -> bool {
        self.rng.gen_bool(self.log_probability)
    }
}

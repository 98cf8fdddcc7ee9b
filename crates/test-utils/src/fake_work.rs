use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;

use anyhow::bail;
use procsync::types::{WorkKind, WorkerId};
use procsync::worker::{WorkContext, WorkFactory, WorkSimulator};

/// A simulator that:
/// - does nothing for each unit
/// - never logs unless asked to
/// - optionally fails (or panics) when it reaches a given unit
/// - optionally waits for a token from a gate before each unit.
///
/// Every unit it performs is counted in a shared counter so tests can check
/// that no work happens while a worker is paused.
pub struct ScriptedWork {
    units: u32,
    fail_at: Option<u32>,
    panic_at: Option<u32>,
    log_units: bool,
    gate: Option<mpsc::Receiver<()>>,
    performed: Arc<AtomicU32>,
}

impl ScriptedWork {
    pub fn instant() -> Self {
        Self {
            units: 0,
            fail_at: None,
            panic_at: None,
            log_units: false,
            gate: None,
            performed: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail with an error when performing unit `unit` (0-based).
    pub fn failing_at(unit: u32) -> Self {
        Self {
            fail_at: Some(unit),
            ..Self::instant()
        }
    }

    /// Panic when performing unit `unit` (0-based).
    pub fn panicking_at(unit: u32) -> Self {
        Self {
            panic_at: Some(unit),
            ..Self::instant()
        }
    }

    pub fn with_counter(mut self, performed: Arc<AtomicU32>) -> Self {
        self.performed = performed;
        self
    }

    /// Ask for a "performing ... work" log event after every unit.
    pub fn logging_every_unit(mut self) -> Self {
        self.log_units = true;
        self
    }

    /// Block each unit until a token arrives on `gate`. A dropped sender
    /// opens the gate for good.
    pub fn gated(mut self, gate: mpsc::Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl WorkSimulator for ScriptedWork {
    fn next_kind(&mut self, kind: WorkKind) -> WorkKind {
        match kind {
            WorkKind::Mixed => WorkKind::Cpu,
            concrete => concrete,
        }
    }

    fn perform(&mut self, _kind: WorkKind) -> anyhow::Result<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        let unit = self.units;
        self.units += 1;
        if self.panic_at == Some(unit) {
            panic!("scripted panic at unit {unit}");
        }
        if self.fail_at == Some(unit) {
            bail!("scripted failure at unit {unit}");
        }
        self.performed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn should_log_unit(&mut self) -> bool {
        self.log_units
    }
}

/// Every worker gets instant work.
pub fn instant_work_factory() -> WorkFactory {
    Arc::new(|_ctx: WorkContext| Box::new(ScriptedWork::instant()) as Box<dyn WorkSimulator>)
}

/// Instant work that counts performed units per worker id in `counters`,
/// indexed by worker id. Ids beyond the slice share no counter.
pub fn counting_work_factory(counters: Arc<Vec<Arc<AtomicU32>>>) -> WorkFactory {
    Arc::new(move |ctx: WorkContext| {
        let work = match counters.get(ctx.worker_id as usize) {
            Some(counter) => ScriptedWork::instant().with_counter(Arc::clone(counter)),
            None => ScriptedWork::instant(),
        };
        Box::new(work) as Box<dyn WorkSimulator>
    })
}

/// Worker `target` fails at `unit`; everyone else gets instant work.
pub fn failing_work_factory(target: WorkerId, unit: u32) -> WorkFactory {
    Arc::new(move |ctx: WorkContext| {
        let work = if ctx.worker_id == target {
            ScriptedWork::failing_at(unit)
        } else {
            ScriptedWork::instant()
        };
        Box::new(work) as Box<dyn WorkSimulator>
    })
}

/// Worker `target` panics at `unit`; everyone else gets instant work.
pub fn panicking_work_factory(target: WorkerId, unit: u32) -> WorkFactory {
    Arc::new(move |ctx: WorkContext| {
        let work = if ctx.worker_id == target {
            ScriptedWork::panicking_at(unit)
        } else {
            ScriptedWork::instant()
        };
        Box::new(work) as Box<dyn WorkSimulator>
    })
}

// src/sampler/mock.rs

//! In-memory metrics source for tests and demos.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;

use super::Metric;
use super::source::MetricsSource;

#[derive(Debug, Clone)]
struct MockState {
    cpu: f32,
    memory: f32,
    disk: f32,
    network: u64,
    failing: HashSet<Metric>,
    read_delay: Option<Duration>,
}

/// Scriptable metrics source.
///
/// Clones share state, so a test can keep one handle and flip sensors to
/// failing (or slow) while the sampler owns the other.
#[derive(Debug, Clone)]
pub struct MockMetricsSource {
    state: Arc<Mutex<MockState>>,
}

impl MockMetricsSource {
    pub fn new(cpu: f32, memory: f32, disk: f32, network: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                cpu,
                memory,
                disk,
                network,
                failing: HashSet::new(),
                read_delay: None,
            })),
        }
    }

    pub fn set_failing(&self, metric: Metric, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(metric);
        } else {
            state.failing.remove(&metric);
        }
    }

    /// Make every CPU read block for `delay` (used to trip read timeouts).
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.lock().read_delay = delay;
    }

    pub fn set_cpu(&self, cpu: f32) {
        self.state.lock().cpu = cpu;
    }

    fn read<T>(&self, metric: Metric, pick: impl FnOnce(&MockState) -> T) -> Result<T> {
        let (delay, failing, value) = {
            let state = self.state.lock();
            (
                state.read_delay,
                state.failing.contains(&metric),
                pick(&state),
            )
        };
        if let (Metric::Cpu, Some(delay)) = (metric, delay) {
            std::thread::sleep(delay);
        }
        if failing {
            return Err(anyhow!("simulated {} sensor failure", metric));
        }
        Ok(value)
    }
}

impl Default for MockMetricsSource {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0)
    }
}

impl MetricsSource for MockMetricsSource {
    fn cpu_percent(&mut self) -> Result<f32> {
        self.read(Metric::Cpu, |s| s.cpu)
    }

    fn memory_percent(&mut self) -> Result<f32> {
        self.read(Metric::Memory, |s| s.memory)
    }

    fn disk_percent(&mut self) -> Result<f32> {
        self.read(Metric::Disk, |s| s.disk)
    }

    fn network_bytes(&mut self) -> Result<u64> {
        self.read(Metric::Network, |s| s.network)
    }
}

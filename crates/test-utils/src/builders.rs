#![allow(dead_code)]

use std::time::Duration;

use procsync::config::{ConfigFile, RawConfigFile};
use procsync::engine::WorkerConfig;
use procsync::types::{Priority, SpeedFactor, WorkKind};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from test-friendly values: sampler off, 10ms poll interval,
/// fixed seed.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.orchestrator.poll_interval_ms = 10;
        config.orchestrator.seed = Some(42);
        config.sampler.enabled = false;
        config.sampler.interval_ms = 20;
        config.sampler.read_timeout_ms = 200;
        config.sampler.stats_log_probability = 0.0;
        Self { config }
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.orchestrator.max_workers = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.orchestrator.poll_interval_ms = ms;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.orchestrator.seed = Some(seed);
        self
    }

    pub fn status_channel_ceiling(mut self, n: usize) -> Self {
        self.config.orchestrator.status_channel_ceiling = n;
        self
    }

    pub fn sampler(mut self, enabled: bool) -> Self {
        self.config.sampler.enabled = enabled;
        self
    }

    pub fn sampler_interval_ms(mut self, ms: u64) -> Self {
        self.config.sampler.interval_ms = ms;
        self
    }

    pub fn sampler_read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.sampler.read_timeout_ms = ms;
        self
    }

    pub fn stats_log_probability(mut self, p: f64) -> Self {
        self.config.sampler.stats_log_probability = p;
        self
    }

    pub fn event_log_capacity(mut self, n: usize) -> Self {
        self.config.event_log.capacity = n;
        self
    }

    pub fn worker_total_units(mut self, n: u32) -> Self {
        self.config.worker.total_units = n;
        self
    }

    pub fn worker_unit_delay_ms(mut self, ms: u64) -> Self {
        self.config.worker.unit_delay_ms = ms;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `WorkerConfig`.
///
/// Defaults to a long-running CPU worker with a short pacing delay, so it
/// reacts to control requests within a few milliseconds but does not finish
/// on its own during a test.
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkerConfig {
                work_kind: Some(WorkKind::Cpu),
                speed: SpeedFactor::default(),
                priority: Priority::Low,
                total_units: 100_000,
                unit_delay: Duration::from_millis(2),
                log_probability: 0.0,
            },
        }
    }

    pub fn kind(mut self, kind: WorkKind) -> Self {
        self.config.work_kind = Some(kind);
        self
    }

    pub fn any_kind(mut self) -> Self {
        self.config.work_kind = None;
        self
    }

    pub fn speed(mut self, factor: f64) -> Self {
        self.config.speed = SpeedFactor::new(factor).expect("invalid speed factor in test");
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.config.priority = priority;
        self
    }

    pub fn total_units(mut self, n: u32) -> Self {
        self.config.total_units = n;
        self
    }

    pub fn unit_delay(mut self, delay: Duration) -> Self {
        self.config.unit_delay = delay;
        self
    }

    pub fn log_probability(mut self, p: f64) -> Self {
        self.config.log_probability = p;
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

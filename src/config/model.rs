// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::sampler::default_disk_mount;
use crate::types::{Priority, SpeedFactor, WorkKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [orchestrator]
/// max_workers = 32
/// poll_interval_ms = 200
/// seed = 42
///
/// [worker]
/// speed = 1.0
/// priority = "normal"
/// kind = "mixed"
/// total_units = 100
/// unit_delay_ms = 250
/// log_probability = 0.1
///
/// [sampler]
/// enabled = true
/// interval_ms = 1000
/// read_timeout_ms = 500
/// stats_log_probability = 0.1
///
/// [event_log]
/// capacity = 10000
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,

    /// Defaults for every spawned worker.
    #[serde(default)]
    pub worker: WorkerSection,

    #[serde(default)]
    pub sampler: SamplerSection,

    #[serde(default)]
    pub event_log: EventLogSection,
}

/// A [`RawConfigFile`] that passed validation.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`)
/// or `Default`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub orchestrator: OrchestratorSection,
    pub worker: WorkerSection,
    pub sampler: SamplerSection,
    pub event_log: EventLogSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            orchestrator: raw.orchestrator,
            worker: raw.worker,
            sampler: raw.sampler,
            event_log: raw.event_log,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorSection {
    /// Maximum number of records in the state table (live or finished but
    /// not yet reaped).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Cadence at which the runtime drains status events.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Undelivered status events above which a warning is logged.
    #[serde(default = "default_status_channel_ceiling")]
    pub status_channel_ceiling: usize,

    /// Seed for every random choice; `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_workers() -> usize {
    32
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_status_channel_ceiling() -> usize {
    100_000
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            status_channel_ceiling: default_status_channel_ceiling(),
            seed: None,
        }
    }
}

impl OrchestratorSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[worker]` section: defaults applied by [`WorkerConfig::from_defaults`].
///
/// [`WorkerConfig::from_defaults`]: crate::engine::WorkerConfig::from_defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSection {
    #[serde(default)]
    pub speed: SpeedFactor,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub kind: WorkKind,

    #[serde(default = "default_total_units")]
    pub total_units: u32,

    /// Pacing delay of one unit at 1x speed.
    #[serde(default = "default_unit_delay_ms")]
    pub unit_delay_ms: u64,

    /// Chance per unit that the worker logs what it is doing.
    #[serde(default = "default_log_probability")]
    pub log_probability: f64,
}

fn default_total_units() -> u32 {
    100
}

fn default_unit_delay_ms() -> u64 {
    250
}

fn default_log_probability() -> f64 {
    0.1
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            speed: SpeedFactor::default(),
            priority: Priority::default(),
            kind: WorkKind::default(),
            total_units: default_total_units(),
            unit_delay_ms: default_unit_delay_ms(),
            log_probability: default_log_probability(),
        }
    }
}

/// `[sampler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sampler_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound on one sensor read.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Chance per snapshot of a "System Stats" event log entry.
    #[serde(default = "default_log_probability")]
    pub stats_log_probability: f64,

    /// Filesystem reported as disk usage.
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_sampler_interval_ms() -> u64 {
    1000
}

fn default_read_timeout_ms() -> u64 {
    500
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_sampler_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            stats_log_probability: default_log_probability(),
            disk_mount: default_disk_mount(),
        }
    }
}

impl SamplerSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// `[event_log]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventLogSection {
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

fn default_log_capacity() -> usize {
    10_000
}

impl Default for EventLogSection {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}

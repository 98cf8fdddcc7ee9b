// src/types.rs

//! Small value types shared by the config layer, the workers and the
//! orchestrator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a worker, allocated monotonically by the orchestrator.
pub type WorkerId = u32;

/// Kind of simulated work a worker performs for each unit.
///
/// - `Cpu`: square a range of integers.
/// - `Io`: sleep briefly, as if waiting on a device.
/// - `Memory`: allocate and touch a buffer.
/// - `Mixed`: pick one of the three above for every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Cpu,
    Io,
    Memory,
    Mixed,
}

impl WorkKind {
    /// The kinds a worker can actually execute for a single unit.
    pub const CONCRETE: [WorkKind; 3] = [WorkKind::Cpu, WorkKind::Io, WorkKind::Memory];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkKind::Cpu => "cpu",
            WorkKind::Io => "io",
            WorkKind::Memory => "memory",
            WorkKind::Mixed => "mixed",
        }
    }
}

impl Default for WorkKind {
    fn default() -> Self {
        WorkKind::Mixed
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(WorkKind::Cpu),
            "io" => Ok(WorkKind::Io),
            "memory" | "mem" => Ok(WorkKind::Memory),
            "mixed" => Ok(WorkKind::Mixed),
            other => Err(format!(
                "invalid work kind: {other} (expected \"cpu\", \"io\", \"memory\" or \"mixed\")"
            )),
        }
    }
}

/// Scheduling hint applied to a worker thread when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    /// Unix niceness used for this priority.
    pub fn niceness(self) -> i32 {
        match self {
            Priority::Low => 19,
            Priority::Normal => 10,
            Priority::High => 0,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "Low",
            Priority::Normal => "Normal",
            Priority::High => "High",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!(
                "invalid priority: {other} (expected \"low\", \"normal\" or \"high\")"
            )),
        }
    }
}

/// Multiplier applied to the pacing delay of every unit of work.
///
/// Always positive and finite. Accepts `"2"`, `"2x"` or `"0.25x"`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SpeedFactor(f64);

impl SpeedFactor {
    /// Presets offered by the original speed selector.
    pub const PRESETS: [f64; 7] = [0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0];

    pub fn new(value: f64) -> Result<Self, String> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(format!("speed factor must be positive and finite (got {value})"))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for SpeedFactor {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f64> for SpeedFactor {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        SpeedFactor::new(value)
    }
}

impl From<SpeedFactor> for f64 {
    fn from(speed: SpeedFactor) -> Self {
        speed.0
    }
}

impl fmt::Display for SpeedFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl FromStr for SpeedFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_suffix('x')
            .or_else(|| trimmed.strip_suffix('X'))
            .unwrap_or(trimmed);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid speed factor: {trimmed}"))?;
        SpeedFactor::new(value)
    }
}

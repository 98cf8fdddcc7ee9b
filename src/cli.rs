// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::ConfigFile;
use crate::types::{Priority, SpeedFactor, WorkKind};

/// Command-line arguments for `procsync`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procsync",
    version,
    about = "Run simulated workers under a pause/resume/terminate orchestrator.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Procsync.toml` in the current working directory if it
    /// exists, otherwise built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of workers to start.
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub workers: usize,

    /// Speed factor for every worker, e.g. `2x` or `0.25`.
    #[arg(long, value_name = "FACTOR")]
    pub speed: Option<SpeedFactor>,

    /// Priority for every worker (low, normal, high).
    #[arg(long, value_name = "PRIORITY")]
    pub priority: Option<Priority>,

    /// Work kind for every worker (cpu, io, memory, mixed).
    #[arg(long, value_name = "KIND")]
    pub kind: Option<WorkKind>,

    /// Seed for every random choice; omit for a fresh seed.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Maximum number of workers the orchestrator will hold.
    #[arg(long, value_name = "N", value_parser = parse_positive)]
    pub max_workers: Option<usize>,

    /// Do not sample system resources.
    #[arg(long)]
    pub no_sampler: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCSYNC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the configuration, print it, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    ///
    /// Every override is already range-checked by its parser, so the result
    /// stays valid.
    pub fn apply_overrides(&self, cfg: &mut ConfigFile) {
        if let Some(speed) = self.speed {
            cfg.worker.speed = speed;
        }
        if let Some(priority) = self.priority {
            cfg.worker.priority = priority;
        }
        if let Some(kind) = self.kind {
            cfg.worker.kind = kind;
        }
        if let Some(seed) = self.seed {
            cfg.orchestrator.seed = Some(seed);
        }
        if let Some(max) = self.max_workers {
            cfg.orchestrator.max_workers = max;
        }
        if self.no_sampler {
            cfg.sampler.enabled = false;
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

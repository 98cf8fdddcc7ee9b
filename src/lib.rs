// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod event_log;
pub mod logging;
pub mod sampler;
pub mod types;
pub mod worker;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default};
use crate::engine::{
    ControlCommand, OrchestratorBuilder, PollReport, Runtime, RuntimeOptions, TableSnapshot,
    WorkerConfig,
};
use crate::errors::ProcsyncError;

/// How long Ctrl-C waits for workers to acknowledge terminate.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the orchestrator and its initial workers
/// - the runtime loop
/// - printing of event log entries and the final summary
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    args.apply_overrides(&mut cfg);

    if args.workers > cfg.orchestrator.max_workers {
        return Err(ProcsyncError::ConfigError(format!(
            "--workers {} exceeds max_workers {}",
            args.workers, cfg.orchestrator.max_workers
        ))
        .into());
    }

    if args.dry_run {
        print_dry_run(&cfg, args.workers);
        return Ok(());
    }

    let mut orchestrator = OrchestratorBuilder::new(cfg.clone()).build()?;
    let worker_config = WorkerConfig::from_defaults(&cfg.worker);
    for _ in 0..args.workers {
        orchestrator.spawn(worker_config.clone())?;
    }
    info!(workers = args.workers, "initial workers started");

    let (cmd_tx, cmd_rx) = mpsc::channel::<ControlCommand>(64);
    let (report_tx, mut report_rx) = mpsc::unbounded_channel::<PollReport>();

    // Ctrl-C → terminate everything and drain.
    let ctrl_c = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = cmd_tx.send(ControlCommand::Shutdown).await;
    });

    let printer = tokio::spawn(async move {
        while let Some(report) = report_rx.recv().await {
            for entry in report.new_log_entries {
                println!("{entry}");
            }
        }
    });

    let options = RuntimeOptions {
        exit_when_idle: true,
        shutdown_timeout: SHUTDOWN_TIMEOUT,
    };
    let runtime = Runtime::new(orchestrator, cmd_rx, options).with_observer(report_tx);
    let orchestrator = runtime.run().await?;

    ctrl_c.abort();
    // The runtime dropped its observer on return, so this ends.
    printer.await?;

    print_summary(&orchestrator.snapshot());
    Ok(())
}

fn print_dry_run(cfg: &ConfigFile, workers: usize) {
    println!("procsync dry-run");
    println!("  workers to start = {workers}");
    println!();

    let o = &cfg.orchestrator;
    println!("[orchestrator]");
    println!("  max_workers = {}", o.max_workers);
    println!("  poll_interval_ms = {}", o.poll_interval_ms);
    println!("  status_channel_ceiling = {}", o.status_channel_ceiling);
    match o.seed {
        Some(seed) => println!("  seed = {seed}"),
        None => println!("  seed = (random)"),
    }

    let w = &cfg.worker;
    println!("[worker]");
    println!("  speed = {}", w.speed);
    println!("  priority = {}", w.priority);
    println!("  kind = {}", w.kind);
    println!("  total_units = {}", w.total_units);
    println!("  unit_delay_ms = {}", w.unit_delay_ms);
    println!("  log_probability = {}", w.log_probability);

    let s = &cfg.sampler;
    println!("[sampler]");
    println!("  enabled = {}", s.enabled);
    if s.enabled {
        println!("  interval_ms = {}", s.interval_ms);
        println!("  read_timeout_ms = {}", s.read_timeout_ms);
        println!("  stats_log_probability = {}", s.stats_log_probability);
        println!("  disk_mount = {}", s.disk_mount.display());
    }

    println!("[event_log]");
    println!("  capacity = {}", cfg.event_log.capacity);

    debug!("dry-run complete (no workers started)");
}

fn print_summary(snapshot: &TableSnapshot) {
    println!();
    println!(
        "{:<4} {:<11} {:<7} {:<7} {:<7} {:>5}  {}",
        "ID", "STATE", "KIND", "SPEED", "PRIO", "PROG", "DETAIL"
    );
    for w in &snapshot.workers {
        let detail = match (&w.last_error, w.duration) {
            (Some(err), _) => format!("error: {err}"),
            (None, Some(d)) => format!("{:.2}s", d.as_secs_f64()),
            (None, None) => String::new(),
        };
        println!(
            "{:<4} {:<11} {:<7} {:<7} {:<7} {:>4}%  {}",
            w.id,
            w.state.as_str(),
            w.work_kind.as_str(),
            w.speed.to_string(),
            w.priority.to_string(),
            w.progress,
            detail
        );
    }

    if let Some(res) = &snapshot.resources {
        let pct = |v: Option<f32>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"));
        println!();
        println!(
            "last resources: cpu {} mem {} disk {} net {}",
            pct(res.cpu_pct),
            pct(res.mem_pct),
            pct(res.disk_pct),
            res.net_bytes
                .map_or_else(|| "n/a".to_string(), |b| format!("{b} bytes")),
        );
    }
}

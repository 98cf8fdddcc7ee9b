// tests/runtime_commands.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, WorkerConfigBuilder};
use crate::common::fake_work::instant_work_factory;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::mpsc;

use procsync::engine::{
    ControlCommand, Orchestrator, OrchestratorBuilder, PollReport, Runtime, RuntimeOptions,
};
use procsync::types::WorkerId;
use procsync::worker::WorkerState;

fn orchestrator() -> Orchestrator {
    OrchestratorBuilder::new(ConfigFileBuilder::new().build())
        .work_factory(instant_work_factory())
        .build()
        .expect("build orchestrator")
}

/// Wait for a report in which `id`'s record changed.
async fn wait_for_change(
    reports: &mut mpsc::UnboundedReceiver<PollReport>,
    id: WorkerId,
) -> PollReport {
    loop {
        let report = reports.recv().await.expect("runtime still publishing");
        if report.changed_workers.contains(&id) {
            return report;
        }
    }
}

/// Wait for a report carrying a log entry that starts with `prefix`.
async fn wait_for_entry(reports: &mut mpsc::UnboundedReceiver<PollReport>, prefix: &str) {
    loop {
        let report = reports.recv().await.expect("runtime still publishing");
        if report
            .new_log_entries
            .iter()
            .any(|e| e.message.starts_with(prefix))
        {
            return;
        }
    }
}

#[tokio::test]
async fn test_commands_drive_workers_and_shutdown_terminates() -> TestResult {
    init_tracing();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (report_tx, mut reports) = mpsc::unbounded_channel();

    let runtime = Runtime::new(orchestrator(), cmd_rx, RuntimeOptions::default())
        .with_observer(report_tx);
    let task = tokio::spawn(runtime.run());

    // 1% progress every 10 units.
    let config = WorkerConfigBuilder::new().total_units(1_000).build();
    cmd_tx.send(ControlCommand::Spawn(config.clone())).await?;
    cmd_tx.send(ControlCommand::Spawn(config)).await?;

    // Progress reports for both workers.
    with_timeout(wait_for_change(&mut reports, 0)).await;
    with_timeout(wait_for_change(&mut reports, 1)).await;

    cmd_tx.send(ControlCommand::Pause(1)).await?;
    cmd_tx.send(ControlCommand::Pause(42)).await?; // rejected, runtime keeps going
    let saw_pause = with_timeout(async {
        loop {
            let report = reports.recv().await.expect("runtime still publishing");
            if report
                .new_log_entries
                .iter()
                .any(|e| e.message == "Worker 1 paused")
            {
                return true;
            }
        }
    })
    .await;
    assert!(saw_pause);

    cmd_tx.send(ControlCommand::Shutdown).await?;
    let orch = with_timeout(task).await??;

    assert!(orch.is_idle());
    let snapshot = orch.snapshot();
    assert_eq!(snapshot.count_in(WorkerState::Terminated), 2);
    Ok(())
}

#[tokio::test]
async fn test_exit_when_idle_stops_after_completion() -> TestResult {
    init_tracing();
    let mut orch = orchestrator();
    let config = WorkerConfigBuilder::new()
        .total_units(10)
        .unit_delay(Duration::from_millis(1))
        .build();
    orch.spawn(config.clone())?;
    orch.spawn(config)?;

    let (_cmd_tx, cmd_rx) = mpsc::channel(4);
    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let options = RuntimeOptions {
        exit_when_idle: true,
        shutdown_timeout: Duration::from_secs(1),
    };

    let orch = with_timeout(Runtime::new(orch, cmd_rx, options).with_observer(report_tx).run()).await?;

    assert_eq!(orch.snapshot().count_in(WorkerState::Completed), 2);

    // Every entry was published exactly once, in order.
    let mut seqs = Vec::new();
    while let Ok(report) = reports.try_recv() {
        seqs.extend(report.new_log_entries.iter().map(|e| e.seq));
    }
    let unique: BTreeSet<u64> = seqs.iter().copied().collect();
    assert_eq!(unique.len(), seqs.len());
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(orch.event_log().last_seq(), seqs.last().copied());
    Ok(())
}

#[tokio::test]
async fn test_bulk_commands() -> TestResult {
    init_tracing();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let task = tokio::spawn(
        Runtime::new(orchestrator(), cmd_rx, RuntimeOptions::default())
            .with_observer(report_tx)
            .run(),
    );

    let config = WorkerConfigBuilder::new().build();
    for _ in 0..3 {
        cmd_tx.send(ControlCommand::Spawn(config.clone())).await?;
    }
    cmd_tx.send(ControlCommand::PauseAll).await?;

    let paused = with_timeout(async {
        let mut paused = BTreeSet::new();
        while paused.len() < 3 {
            let report = reports.recv().await.expect("runtime still publishing");
            for entry in &report.new_log_entries {
                if let Some(rest) = entry.message.strip_prefix("Worker ") {
                    if let Some(id) = rest.strip_suffix(" paused") {
                        paused.insert(id.to_string());
                    }
                }
            }
        }
        paused
    })
    .await;
    assert_eq!(paused.len(), 3);

    cmd_tx.send(ControlCommand::ResumeAll).await?;
    cmd_tx.send(ControlCommand::TerminateAll).await?;
    drop(cmd_tx);

    // Closing the command channel without exit_when_idle stops the runtime.
    let orch = with_timeout(task).await??;
    assert_eq!(orch.snapshot().count_in(WorkerState::Terminated), 3);
    Ok(())
}

#[tokio::test]
async fn test_spawn_reuses_slot_of_finished_worker() -> TestResult {
    init_tracing();
    let orch = OrchestratorBuilder::new(ConfigFileBuilder::new().max_workers(1).build())
        .work_factory(instant_work_factory())
        .build()?;
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let task = tokio::spawn(
        Runtime::new(orch, cmd_rx, RuntimeOptions::default())
            .with_observer(report_tx)
            .run(),
    );

    let quick = WorkerConfigBuilder::new()
        .total_units(5)
        .unit_delay(Duration::from_millis(1))
        .build();
    cmd_tx.send(ControlCommand::Spawn(quick.clone())).await?;
    with_timeout(wait_for_entry(&mut reports, "Worker 0 completed")).await;

    // The only slot belongs to a finished worker; the next spawn takes it.
    cmd_tx.send(ControlCommand::Spawn(quick)).await?;
    with_timeout(wait_for_entry(&mut reports, "Worker 1 completed")).await;

    cmd_tx.send(ControlCommand::Shutdown).await?;
    let orch = with_timeout(task).await??;

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.workers.len(), 1);
    assert!(snapshot.worker(0).is_none());
    assert_eq!(snapshot.worker(1).map(|w| w.state), Some(WorkerState::Completed));
    Ok(())
}

#[tokio::test]
async fn test_spawn_rejected_while_slots_are_live() -> TestResult {
    init_tracing();
    let orch = OrchestratorBuilder::new(ConfigFileBuilder::new().max_workers(1).build())
        .work_factory(instant_work_factory())
        .build()?;
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let task = tokio::spawn(Runtime::new(orch, cmd_rx, RuntimeOptions::default()).run());

    let config = WorkerConfigBuilder::new().build();
    cmd_tx.send(ControlCommand::Spawn(config.clone())).await?;
    cmd_tx.send(ControlCommand::Spawn(config)).await?;
    cmd_tx.send(ControlCommand::Reap).await?;
    cmd_tx.send(ControlCommand::Shutdown).await?;

    let orch = with_timeout(task).await??;
    let snapshot = orch.snapshot();
    assert_eq!(snapshot.workers.len(), 1);
    assert_eq!(snapshot.worker(0).map(|w| w.state), Some(WorkerState::Terminated));
    Ok(())
}

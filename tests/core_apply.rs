// tests/core_apply.rs

mod common;
use crate::common::event;

use std::time::Duration;

use chrono::Local;
use procsync::engine::{OrchestratorCore, WorkerRecord};
use procsync::errors::ProcsyncError;
use procsync::event_log::LogLevel;
use procsync::sampler::{Metric, ResourceSnapshot, Unavailable};
use procsync::types::{Priority, SpeedFactor, WorkKind, WorkerId};
use procsync::worker::{StatusKind, WorkerState};

/// Core with `n` running workers, ids `0..n`.
fn core_with(n: WorkerId) -> OrchestratorCore {
    let mut core = OrchestratorCore::new(1_000, 0.0, 1);
    for id in 0..n {
        core.register(WorkerRecord::new(
            id,
            WorkKind::Cpu,
            SpeedFactor::default(),
            Priority::Normal,
        ));
        core.mark_running(id).unwrap();
    }
    core
}

fn state(core: &OrchestratorCore, id: WorkerId) -> WorkerState {
    core.table().get(id).unwrap().state
}

fn messages(core: &OrchestratorCore) -> Vec<String> {
    core.event_log().iter().map(|e| e.message.clone()).collect()
}

#[test]
fn test_register_starts_created_then_running() {
    let mut core = OrchestratorCore::new(100, 0.0, 1);
    core.register(WorkerRecord::new(0, WorkKind::Io, SpeedFactor::default(), Priority::High));
    assert_eq!(state(&core, 0), WorkerState::Created);
    assert!(!core.is_idle());

    core.mark_running(0).unwrap();
    assert_eq!(state(&core, 0), WorkerState::Running);

    let err = core.mark_running(0).unwrap_err();
    assert!(matches!(
        err,
        ProcsyncError::InvalidTransition { id: 0, from: WorkerState::Running, to: WorkerState::Running }
    ));
}

#[test]
fn test_progress_is_monotone() {
    let mut core = core_with(1);

    assert!(core.apply_status(event(0, 0, StatusKind::Progress(40))));
    assert!(!core.apply_status(event(0, 1, StatusKind::Progress(30))));
    assert!(!core.apply_status(event(0, 2, StatusKind::Progress(40))));
    assert_eq!(core.table().get(0).unwrap().progress, 40);

    assert!(core.apply_status(event(0, 3, StatusKind::Progress(250))));
    assert_eq!(core.table().get(0).unwrap().progress, 100);
}

#[test]
fn test_replayed_seq_is_ignored() {
    let mut core = core_with(1);

    assert!(core.apply_status(event(0, 5, StatusKind::Paused)));
    assert!(!core.apply_status(event(0, 5, StatusKind::Resumed)));
    assert!(!core.apply_status(event(0, 4, StatusKind::Resumed)));
    assert_eq!(state(&core, 0), WorkerState::Paused);
}

#[test]
fn test_pause_resume_round_trip_logs_each_step() {
    let mut core = core_with(1);
    core.apply_status(event(0, 0, StatusKind::Progress(20)));

    assert!(core.apply_status(event(0, 1, StatusKind::Paused)));
    assert_eq!(state(&core, 0), WorkerState::Paused);
    assert!(core.apply_status(event(0, 2, StatusKind::Resumed)));
    assert_eq!(state(&core, 0), WorkerState::Running);

    assert_eq!(core.table().get(0).unwrap().progress, 20);
    assert_eq!(messages(&core), vec!["Worker 0 paused", "Worker 0 resumed"]);
}

#[test]
fn test_invalid_transition_from_event_is_ignored() {
    let mut core = core_with(1);

    assert!(!core.apply_status(event(0, 0, StatusKind::Resumed)));
    assert_eq!(state(&core, 0), WorkerState::Running);
    assert!(core.event_log().is_empty());
}

#[test]
fn test_completed_sets_duration_and_full_progress() {
    let mut core = core_with(1);
    core.apply_status(event(0, 0, StatusKind::Progress(99)));

    let elapsed = Duration::from_millis(1_234);
    assert!(core.apply_status(event(0, 1, StatusKind::Completed { elapsed })));

    let rec = core.table().get(0).unwrap();
    assert_eq!(rec.state, WorkerState::Completed);
    assert_eq!(rec.progress, 100);
    assert_eq!(rec.duration, Some(elapsed));
    assert!(rec.ended_at.is_some());
    assert_eq!(messages(&core), vec!["Worker 0 completed in 1.23s"]);
    assert!(core.is_idle());
}

#[test]
fn test_error_fails_worker_with_one_error_entry() {
    let mut core = core_with(2);

    assert!(core.apply_status(event(1, 0, StatusKind::Error { message: "disk on fire".into() })));

    let rec = core.table().get(1).unwrap();
    assert_eq!(rec.state, WorkerState::Failed);
    assert_eq!(rec.last_error.as_deref(), Some("disk on fire"));

    let errors: Vec<_> = core
        .event_log()
        .iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Worker 1 failed: disk on fire");

    assert_eq!(state(&core, 0), WorkerState::Running);
}

#[test]
fn test_events_after_terminal_are_ignored() {
    let mut core = core_with(1);
    core.apply_status(event(0, 0, StatusKind::Progress(10)));
    assert!(core.apply_status(event(0, 1, StatusKind::Terminated)));

    assert!(!core.apply_status(event(0, 2, StatusKind::Progress(90))));
    assert!(!core.apply_status(event(0, 3, StatusKind::Error { message: "late".into() })));
    assert!(!core.apply_status(event(0, 4, StatusKind::Log { level: LogLevel::Info, message: "late".into() })));

    let rec = core.table().get(0).unwrap();
    assert_eq!(rec.state, WorkerState::Terminated);
    assert_eq!(rec.progress, 10);
    assert_eq!(messages(&core), vec!["Worker 0 terminated"]);
}

#[test]
fn test_log_events_land_in_event_log() {
    let mut core = core_with(1);
    let changed = core.apply_status(event(
        0,
        0,
        StatusKind::Log {
            level: LogLevel::Warn,
            message: "Worker 0 priority setting failed: nope".into(),
        },
    ));

    assert!(!changed);
    let entry = core.event_log().iter().next().unwrap();
    assert_eq!(entry.level, LogLevel::Warn);
    assert!(entry.message.contains("priority setting failed"));
}

#[test]
fn test_unknown_worker_event_is_ignored() {
    let mut core = core_with(1);
    assert!(!core.apply_status(event(42, 0, StatusKind::Progress(1))));
    assert_eq!(core.table().len(), 1);
}

#[test]
fn test_control_checks() {
    let mut core = core_with(1);

    assert!(core.ensure_controllable(0, WorkerState::Paused).is_ok());
    assert!(matches!(
        core.ensure_controllable(3, WorkerState::Paused),
        Err(ProcsyncError::UnknownWorker(3))
    ));

    assert!(core.request_termination(0).unwrap());
    assert!(core.table().get(0).unwrap().termination_requested);

    core.apply_status(event(0, 0, StatusKind::Terminated));
    assert!(!core.request_termination(0).unwrap());
    assert!(matches!(
        core.ensure_controllable(0, WorkerState::Running),
        Err(ProcsyncError::InvalidTransition { id: 0, from: WorkerState::Terminated, to: WorkerState::Running })
    ));
}

#[test]
fn test_reap_removes_only_terminal_records() {
    let mut core = core_with(3);
    core.apply_status(event(0, 0, StatusKind::Completed { elapsed: Duration::from_secs(1) }));
    core.apply_status(event(2, 0, StatusKind::Terminated));

    let reaped: Vec<WorkerId> = core.reap().into_iter().map(|r| r.id).collect();
    assert_eq!(reaped, vec![0, 2]);
    assert_eq!(core.table().len(), 1);
    assert!(core.table().contains(1));
    assert!(core.reap().is_empty());
}

#[test]
fn test_snapshot_with_unreadable_field_logs_one_warning() {
    let mut core = OrchestratorCore::new(100, 0.0, 1);
    let snapshot = ResourceSnapshot {
        timestamp: Local::now(),
        cpu_pct: Some(12.0),
        mem_pct: None,
        disk_pct: Some(40.0),
        net_bytes: Some(1024),
        unavailable: vec![Unavailable {
            metric: Metric::Memory,
            reason: "sensor gone".into(),
        }],
    };

    core.apply_snapshot(snapshot.clone());

    assert_eq!(core.latest_snapshot(), Some(&snapshot));
    let entries: Vec<_> = core.event_log().iter().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Warn);
    assert_eq!(entries[0].message, "Resource readings unavailable: memory (sensor gone)");
}

#[test]
fn test_stats_entry_when_probability_is_one() {
    let mut core = OrchestratorCore::new(100, 1.0, 1);
    let snapshot = ResourceSnapshot {
        timestamp: Local::now(),
        cpu_pct: Some(12.5),
        mem_pct: Some(50.0),
        disk_pct: None,
        net_bytes: None,
        unavailable: vec![
            Unavailable { metric: Metric::Disk, reason: "x".into() },
            Unavailable { metric: Metric::Network, reason: "y".into() },
        ],
    };

    core.apply_snapshot(snapshot);

    let messages = messages(&core);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1], "System Stats - CPU: 12.5%, Memory: 50.0%, Disk: n/a");
}

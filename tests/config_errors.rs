// tests/config_errors.rs

mod common;
use crate::common::TestResult;
use crate::common::builders::ConfigFileBuilder;

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use procsync::config::{ConfigFile, load_and_validate};
use procsync::errors::ProcsyncError;
use procsync::types::{Priority, WorkKind};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn expect_config_error(toml: &str, needle: &str) {
    let file = write_config(toml);
    match load_and_validate(file.path()) {
        Err(ProcsyncError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_empty_file_uses_defaults() -> TestResult {
    let file = write_config("");
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.orchestrator.max_workers, 32);
    assert_eq!(cfg.orchestrator.poll_interval(), Duration::from_millis(200));
    assert_eq!(cfg.orchestrator.status_channel_ceiling, 100_000);
    assert_eq!(cfg.orchestrator.seed, None);
    assert_eq!(cfg.worker.total_units, 100);
    assert_eq!(cfg.worker.unit_delay_ms, 250);
    assert_eq!(cfg.worker.kind, WorkKind::Mixed);
    assert_eq!(cfg.worker.priority, Priority::Normal);
    assert!(cfg.sampler.enabled);
    assert_eq!(cfg.sampler.interval(), Duration::from_secs(1));
    assert_eq!(cfg.sampler.read_timeout(), Duration::from_millis(500));
    assert_eq!(cfg.event_log.capacity, 10_000);
    Ok(())
}

#[test]
fn test_partial_sections_fill_defaults() -> TestResult {
    let file = write_config(
        r#"
[orchestrator]
max_workers = 4
seed = 99

[worker]
speed = 2.5
priority = "high"
kind = "io"
"#,
    );
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.orchestrator.max_workers, 4);
    assert_eq!(cfg.orchestrator.seed, Some(99));
    assert_eq!(cfg.orchestrator.poll_interval_ms, 200);
    assert_eq!(cfg.worker.speed.get(), 2.5);
    assert_eq!(cfg.worker.priority, Priority::High);
    assert_eq!(cfg.worker.kind, WorkKind::Io);
    assert_eq!(cfg.worker.log_probability, 0.1);
    Ok(())
}

#[test]
fn test_zero_max_workers_is_rejected() {
    expect_config_error("[orchestrator]\nmax_workers = 0\n", "max_workers");
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    expect_config_error("[orchestrator]\npoll_interval_ms = 0\n", "poll_interval_ms");
}

#[test]
fn test_probability_out_of_range_is_rejected() {
    expect_config_error("[worker]\nlog_probability = 1.5\n", "log_probability");
    expect_config_error("[sampler]\nstats_log_probability = -0.1\n", "stats_log_probability");
}

#[test]
fn test_tiny_event_log_is_rejected() {
    expect_config_error("[event_log]\ncapacity = 1\n", "capacity");
}

#[test]
fn test_zero_units_and_intervals_are_rejected() {
    expect_config_error("[worker]\ntotal_units = 0\n", "total_units");
    expect_config_error("[sampler]\ninterval_ms = 0\n", "interval_ms");
    expect_config_error("[sampler]\nread_timeout_ms = 0\n", "read_timeout_ms");
}

#[test]
fn test_negative_speed_fails_to_parse() {
    let file = write_config("[worker]\nspeed = -1.0\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, ProcsyncError::TomlError(_)), "got {err:?}");
}

#[test]
fn test_unknown_key_fails_to_parse() {
    let file = write_config("[orchestrator]\nmax_wrokers = 3\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, ProcsyncError::TomlError(_)), "got {err:?}");
}

#[test]
fn test_unknown_priority_fails_to_parse() {
    let file = write_config("[worker]\npriority = \"urgent\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ProcsyncError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ProcsyncError::IoError(_)));
}

#[test]
fn test_builder_output_passes_validation() {
    let raw = ConfigFileBuilder::new().max_workers(3).build_raw();
    let cfg = ConfigFile::try_from(raw).expect("valid");
    assert_eq!(cfg.orchestrator.max_workers, 3);
    assert!(!cfg.sampler.enabled);
}

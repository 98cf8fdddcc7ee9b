// tests/sampler.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{SOON, TestResult, init_tracing, poll_until, with_timeout};

use std::time::Duration;

use tokio::sync::mpsc;

use procsync::engine::OrchestratorBuilder;
use procsync::event_log::LogLevel;
use procsync::sampler::{Metric, MockMetricsSource, ResourceSampler};

fn sampler(source: &MockMetricsSource, read_timeout: Duration) -> ResourceSampler {
    ResourceSampler::new(
        Box::new(source.clone()),
        Duration::from_millis(20),
        read_timeout,
    )
}

#[tokio::test]
async fn test_all_readings_available() -> TestResult {
    init_tracing();
    let source = MockMetricsSource::new(12.5, 40.0, 70.0, 4096);

    let snap = sampler(&source, Duration::from_millis(500)).sample_once().await;

    assert_eq!(snap.cpu_pct, Some(12.5));
    assert_eq!(snap.mem_pct, Some(40.0));
    assert_eq!(snap.disk_pct, Some(70.0));
    assert_eq!(snap.net_bytes, Some(4096));
    assert!(snap.unavailable.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failing_sensor_marks_only_its_field() -> TestResult {
    init_tracing();
    let source = MockMetricsSource::new(10.0, 20.0, 30.0, 1);
    source.set_failing(Metric::Disk, true);

    let snap = sampler(&source, Duration::from_millis(500)).sample_once().await;

    assert_eq!(snap.disk_pct, None);
    assert!(!snap.is_available(Metric::Disk));
    assert_eq!(snap.cpu_pct, Some(10.0));
    assert_eq!(snap.mem_pct, Some(20.0));
    assert_eq!(snap.net_bytes, Some(1));

    assert_eq!(snap.unavailable.len(), 1);
    assert_eq!(snap.unavailable[0].metric, Metric::Disk);
    assert!(snap.unavailable[0].reason.contains("simulated disk sensor failure"));
    Ok(())
}

#[tokio::test]
async fn test_slow_sensor_times_out_as_unavailable() -> TestResult {
    init_tracing();
    let source = MockMetricsSource::new(10.0, 20.0, 30.0, 1);
    source.set_read_delay(Some(Duration::from_millis(300)));

    let s = sampler(&source, Duration::from_millis(30));
    let snap = with_timeout(s.sample_once()).await;

    assert_eq!(snap.cpu_pct, None);
    assert_eq!(snap.mem_pct, None);
    assert_eq!(snap.disk_pct, None);
    assert_eq!(snap.net_bytes, None);
    assert_eq!(snap.unavailable.len(), 4);
    assert!(snap.unavailable.iter().all(|u| u.reason.contains("timed out")));

    // The stuck read still holds the source; the next cycle does not queue
    // behind it.
    let next = with_timeout(s.sample_once()).await;
    assert_eq!(next.unavailable.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_spawned_sampler_publishes_until_shutdown() -> TestResult {
    init_tracing();
    let source = MockMetricsSource::new(1.0, 2.0, 3.0, 4);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = sampler(&source, Duration::from_millis(200)).spawn(tx);

    let first = with_timeout(rx.recv()).await.expect("first snapshot");
    source.set_cpu(55.0);
    let mut latest = with_timeout(rx.recv()).await.expect("second snapshot");
    while latest.cpu_pct != Some(55.0) {
        latest = with_timeout(rx.recv()).await.expect("more snapshots");
    }
    assert!(latest.timestamp >= first.timestamp);

    with_timeout(handle.shutdown()).await;
    // Sender side is gone once the task has finished.
    while rx.try_recv().is_ok() {}
    assert!(with_timeout(rx.recv()).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_sampler_stops_when_handle_dropped() -> TestResult {
    init_tracing();
    let source = MockMetricsSource::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = sampler(&source, Duration::from_millis(200)).spawn(tx);
    with_timeout(rx.recv()).await.expect("one snapshot");
    drop(handle);

    // Drain whatever was already queued; then the channel closes.
    let closed = with_timeout(async {
        while rx.recv().await.is_some() {}
        true
    })
    .await;
    assert!(closed);
    Ok(())
}

#[tokio::test]
async fn test_orchestrator_logs_unreadable_fields_and_stats() -> TestResult {
    init_tracing();
    let source = MockMetricsSource::new(12.5, 40.0, 70.0, 4096);
    source.set_failing(Metric::Memory, true);

    let cfg = ConfigFileBuilder::new()
        .sampler(true)
        .sampler_interval_ms(20)
        .stats_log_probability(1.0)
        .build();
    let mut orch = OrchestratorBuilder::new(cfg)
        .metrics_source(Box::new(source.clone()))
        .build()?;

    assert!(poll_until(&mut orch, SOON, |o| o.snapshot().resources.is_some()).await);

    let resources = orch.snapshot().resources.expect("snapshot present");
    assert_eq!(resources.mem_pct, None);
    assert_eq!(resources.cpu_pct, Some(12.5));

    let log: Vec<_> = orch.event_log().iter().cloned().collect();
    assert!(log.iter().any(|e| e.level == LogLevel::Warn
        && e.message.starts_with("Resource readings unavailable: memory")));
    assert!(log.iter().any(|e| e.message
        == "System Stats - CPU: 12.5%, Memory: n/a, Disk: 70.0%"));

    with_timeout(orch.shutdown(Duration::from_secs(1))).await;
    Ok(())
}

#[test]
fn test_sampler_requires_a_runtime() {
    let cfg = ConfigFileBuilder::new().sampler(true).build();
    let result = OrchestratorBuilder::new(cfg)
        .metrics_source(Box::new(MockMetricsSource::default()))
        .build();
    assert!(result.is_err());
}

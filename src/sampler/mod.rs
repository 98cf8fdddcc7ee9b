// src/sampler/mod.rs

//! Periodic system resource sampling.
//!
//! The sampler runs as its own Tokio task, decoupled from how often anyone
//! polls the orchestrator. Every tick it reads the [`MetricsSource`] on a
//! blocking thread, bounded by a timeout, and publishes one
//! [`ResourceSnapshot`]. A failed or slow sensor never skips a cycle: the
//! affected fields are published as unavailable instead.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub mod mock;
pub mod source;

pub use mock::MockMetricsSource;
pub use source::{MetricsSource, SystemMetricsSource, default_disk_mount};

/// The individual readings of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Cpu, Metric::Memory, Metric::Disk, Metric::Network];
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
            Metric::Network => "network",
        };
        f.write_str(s)
    }
}

/// A reading that could not be taken, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unavailable {
    pub metric: Metric,
    pub reason: String,
}

/// One immutable sample of system-wide resource usage.
///
/// `None` means "could not be read", which is different from zero usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    pub timestamp: DateTime<Local>,
    pub cpu_pct: Option<f32>,
    pub mem_pct: Option<f32>,
    pub disk_pct: Option<f32>,
    pub net_bytes: Option<u64>,
    /// One entry per `None` field above.
    pub unavailable: Vec<Unavailable>,
}

impl ResourceSnapshot {
    /// Snapshot with every reading missing for the same reason.
    pub fn unavailable(timestamp: DateTime<Local>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            timestamp,
            cpu_pct: None,
            mem_pct: None,
            disk_pct: None,
            net_bytes: None,
            unavailable: Metric::ALL
                .iter()
                .map(|&metric| Unavailable {
                    metric,
                    reason: reason.clone(),
                })
                .collect(),
        }
    }

    /// Read every metric once; failures are recorded per field.
    pub fn read_from(source: &mut dyn MetricsSource, timestamp: DateTime<Local>) -> Self {
        let mut unavailable = Vec::new();
        let mut note = |metric: Metric, err: anyhow::Error| {
            unavailable.push(Unavailable {
                metric,
                reason: format!("{err:#}"),
            });
        };

        let cpu_pct = source.cpu_percent().map_err(|e| note(Metric::Cpu, e)).ok();
        let mem_pct = source.memory_percent().map_err(|e| note(Metric::Memory, e)).ok();
        let disk_pct = source.disk_percent().map_err(|e| note(Metric::Disk, e)).ok();
        let net_bytes = source.network_bytes().map_err(|e| note(Metric::Network, e)).ok();

        Self {
            timestamp,
            cpu_pct,
            mem_pct,
            disk_pct,
            net_bytes,
            unavailable,
        }
    }

    pub fn is_available(&self, metric: Metric) -> bool {
        match metric {
            Metric::Cpu => self.cpu_pct.is_some(),
            Metric::Memory => self.mem_pct.is_some(),
            Metric::Disk => self.disk_pct.is_some(),
            Metric::Network => self.net_bytes.is_some(),
        }
    }
}

/// Periodic sampler over a shared metrics source.
#[derive(Debug, Clone)]
pub struct ResourceSampler {
    source: Arc<Mutex<Box<dyn MetricsSource>>>,
    interval: Duration,
    read_timeout: Duration,
}

impl ResourceSampler {
    pub fn new(source: Box<dyn MetricsSource>, interval: Duration, read_timeout: Duration) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            interval,
            read_timeout,
        }
    }

    /// Take a single snapshot, waiting at most `read_timeout` for the source.
    ///
    /// If a previous read is still stuck inside the source, this does not
    /// queue behind it; it reports every field unavailable straight away.
    pub async fn sample_once(&self) -> ResourceSnapshot {
        let timestamp = Local::now();
        let source = Arc::clone(&self.source);

        let read = tokio::task::spawn_blocking(move || {
            let mut guard = source.try_lock()?;
            Some(ResourceSnapshot::read_from(&mut **guard, timestamp))
        });

        match tokio::time::timeout(self.read_timeout, read).await {
            Ok(Ok(Some(snapshot))) => snapshot,
            Ok(Ok(None)) => {
                ResourceSnapshot::unavailable(timestamp, "sensor still busy with a previous read")
            }
            Ok(Err(join_err)) => {
                ResourceSnapshot::unavailable(timestamp, format!("sensor read aborted: {join_err}"))
            }
            Err(_elapsed) => ResourceSnapshot::unavailable(
                timestamp,
                format!("sensor read timed out after {:?}", self.read_timeout),
            ),
        }
    }

    /// Spawn the sampling loop on the current Tokio runtime.
    ///
    /// The loop ends when the returned handle is shut down or dropped, or
    /// when `tx`'s receiver goes away.
    pub fn spawn(self, tx: mpsc::UnboundedSender<ResourceSnapshot>) -> SamplerHandle {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            info!(interval = ?self.interval, read_timeout = ?self.read_timeout, "resource sampler started");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        debug!("resource sampler cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let snapshot = self.sample_once().await;
                        if !snapshot.unavailable.is_empty() {
                            warn!(
                                unavailable = snapshot.unavailable.len(),
                                "resource snapshot has unreadable fields"
                            );
                        }
                        if tx.send(snapshot).is_err() {
                            debug!("snapshot receiver dropped; stopping sampler");
                            break;
                        }
                    }
                }
            }

            info!("resource sampler finished");
        });

        SamplerHandle {
            cancel: Some(cancel_tx),
            handle,
        }
    }
}

/// Owner handle of a running sampler task.
#[derive(Debug)]
pub struct SamplerHandle {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SamplerHandle {
    /// Stop the sampler and wait for its task to finish.
    pub async fn shutdown(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!(error = %e, "resource sampler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

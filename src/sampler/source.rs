// src/sampler/source.rs

//! Where resource metrics come from.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};

/// Abstract metrics interface.
///
/// Every reading is independent: one failing sensor must not hide the others.
/// Calls may block (they run on a blocking thread with a timeout).
pub trait MetricsSource: Send + Debug + 'static {
    /// System-wide CPU utilisation in percent.
    fn cpu_percent(&mut self) -> Result<f32>;
    /// Used memory in percent of total.
    fn memory_percent(&mut self) -> Result<f32>;
    /// Used space of the monitored filesystem in percent.
    fn disk_percent(&mut self) -> Result<f32>;
    /// Cumulative bytes sent plus received over all interfaces.
    fn network_bytes(&mut self) -> Result<u64>;
}

/// Implementation backed by `sysinfo`.
pub struct SystemMetricsSource {
    system: System,
    disk_mount: PathBuf,
}

impl Debug for SystemMetricsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMetricsSource")
            .field("disk_mount", &self.disk_mount)
            .finish_non_exhaustive()
    }
}

impl SystemMetricsSource {
    /// `disk_mount` selects the filesystem reported as disk usage.
    pub fn new(disk_mount: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; prime the first one.
        system.refresh_cpu();
        system.refresh_disks_list();
        system.refresh_networks_list();
        Self {
            system,
            disk_mount: disk_mount.into(),
        }
    }

    pub fn disk_mount(&self) -> &Path {
        &self.disk_mount
    }
}

impl MetricsSource for SystemMetricsSource {
    fn cpu_percent(&mut self) -> Result<f32> {
        self.system.refresh_cpu();
        let usage = self.system.global_cpu_info().cpu_usage();
        if !usage.is_finite() {
            bail!("cpu usage reading is not a number");
        }
        Ok(usage)
    }

    fn memory_percent(&mut self) -> Result<f32> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            bail!("total memory reported as zero");
        }
        Ok(self.system.used_memory() as f32 / total as f32 * 100.0)
    }

    fn disk_percent(&mut self) -> Result<f32> {
        self.system.refresh_disks();
        let disk = self
            .system
            .disks()
            .iter()
            .find(|d| d.mount_point() == self.disk_mount.as_path());

        let Some(disk) = disk else {
            bail!("no disk mounted at {:?}", self.disk_mount);
        };

        let total = disk.total_space();
        if total == 0 {
            bail!("disk at {:?} reports zero capacity", self.disk_mount);
        }
        let used = total.saturating_sub(disk.available_space());
        Ok(used as f32 / total as f32 * 100.0)
    }

    fn network_bytes(&mut self) -> Result<u64> {
        self.system.refresh_networks();
        let mut interfaces = 0usize;
        let mut bytes = 0u64;
        for (_name, data) in self.system.networks().iter() {
            interfaces += 1;
            bytes = bytes
                .saturating_add(data.total_received())
                .saturating_add(data.total_transmitted());
        }
        if interfaces == 0 {
            bail!("no network interfaces found");
        }
        Ok(bytes)
    }
}

/// Default filesystem to report on for this platform.
pub fn default_disk_mount() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

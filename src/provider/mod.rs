//! Metric providers
//!
//! Checks never read the OS directly. They ask a [`MetricProvider`] for
//! structured samples; the concrete provider wraps `sysinfo`, tests use a fake.

pub mod sysinfo_provider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::monitors::snapshot::{NetworkCounters, Snapshot};

pub use sysinfo_provider::SysinfoProvider;

#[async_trait]
pub trait MetricProvider: Send + Sync {
    async fn memory(&self) -> anyhow::Result<MemorySample>;

    /// Per-core busy percentages over a short sampling window
    async fn cpu(&self) -> anyhow::Result<CpuSample>;

    async fn disks(&self) -> anyhow::Result<Vec<DiskSample>>;

    /// Cumulative counters for every interface, at the time of the call
    async fn network(&self) -> anyhow::Result<Vec<NetworkSample>>;

    async fn processes(&self) -> anyhow::Result<Vec<ProcessSample>>;
}

/// Returns `part / whole * 100`, or `0.0` for an empty whole.
fn safe_percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub total: u64,
    pub used: u64,
    pub total_swap: u64,
    pub used_swap: u64,
}

impl MemorySample {
    pub fn usage_percent(&self) -> f64 {
        safe_percent(self.used, self.total)
    }

    pub fn swap_percent(&self) -> f64 {
        safe_percent(self.used_swap, self.total_swap)
    }

    pub fn report(&self) -> String {
        const MIB: u64 = 1024 * 1024;
        format!(
            "memory: {} MiB used of {} MiB ({:.1}%)\nswap:   {} MiB used of {} MiB ({:.1}%)\n",
            self.used / MIB,
            self.total / MIB,
            self.usage_percent(),
            self.used_swap / MIB,
            self.total_swap / MIB,
            self.swap_percent(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    pub per_core: Vec<f32>,
}

impl CpuSample {
    /// Mean of the per-core figures, `0.0` with no cores
    pub fn average(&self) -> f64 {
        if self.per_core.is_empty() {
            return 0.0;
        }
        self.per_core.iter().map(|u| f64::from(*u)).sum::<f64>() / self.per_core.len() as f64
    }

    pub fn report(&self) -> String {
        let mut out = format!("cpu: {:.1}% average over {} cores\n", self.average(), self.per_core.len());
        for (i, usage) in self.per_core.iter().enumerate() {
            out.push_str(&format!("  cpu{i}: {usage:.1}%\n"));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSample {
    pub device: String,
    pub mount_point: String,
    pub file_system: String,
    pub total: u64,
    pub available: u64,
}

impl DiskSample {
    pub fn usage_percent(&self) -> f64 {
        safe_percent(self.total.saturating_sub(self.available), self.total)
    }

    /// tmpfs, devtmpfs and friends are never evaluated
    pub fn is_temporary(&self) -> bool {
        let fs = self.file_system.to_ascii_lowercase();
        fs.contains("tmpfs") || fs == "ramfs" || self.device.to_ascii_lowercase().contains("tmpfs")
    }

    pub fn report_line(&self) -> String {
        const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
        format!(
            "{} on {} ({}): {:.1}% used, {:.1} GiB free of {:.1} GiB",
            self.device,
            self.mount_point,
            self.file_system,
            self.usage_percent(),
            self.available as f64 / GIB,
            self.total as f64 / GIB,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSample {
    pub iface: String,
    pub counters: NetworkCounters,
}

impl NetworkSample {
    pub fn snapshot(samples: Vec<NetworkSample>) -> Snapshot<NetworkCounters> {
        Snapshot::new(samples.into_iter().map(|s| (s.iface, s.counters)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
}

impl ProcessSample {
    /// Text a service pattern is matched against
    pub fn match_text(&self) -> String {
        format!("{} {}", self.name, self.cmdline)
    }
}

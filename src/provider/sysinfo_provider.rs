use async_trait::async_trait;
use sysinfo::{Disks, Networks, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::sync::Mutex;
use tracing::{instrument, trace};

use super::{CpuSample, DiskSample, MemorySample, MetricProvider, NetworkSample, ProcessSample};
use crate::monitors::snapshot::NetworkCounters;

/// Reads host metrics through the `sysinfo` crate.
///
/// `System` needs `&mut self` to refresh, so it sits behind an async mutex.
pub struct SysinfoProvider {
    sys: Mutex<System>,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for SysinfoProvider {
    async fn memory(&self) -> anyhow::Result<MemorySample> {
        let mut sys = self.sys.lock().await;
        sys.refresh_memory();

        Ok(MemorySample {
            total: sys.total_memory(),
            used: sys.used_memory(),
            total_swap: sys.total_swap(),
            used_swap: sys.used_swap(),
        })
    }

    #[instrument(skip_all)]
    async fn cpu(&self) -> anyhow::Result<CpuSample> {
        let mut sys = self.sys.lock().await;

        // usage is computed between two refreshes
        sys.refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();

        let per_core: Vec<f32> = sys.cpus().iter().map(|cpu| cpu.cpu_usage()).collect();
        trace!("sampled {} cores", per_core.len());
        anyhow::ensure!(!per_core.is_empty(), "no CPUs reported");

        Ok(CpuSample { per_core })
    }

    async fn disks(&self) -> anyhow::Result<Vec<DiskSample>> {
        let disks = Disks::new_with_refreshed_list();

        Ok(disks
            .list()
            .iter()
            .map(|disk| DiskSample {
                device: disk.name().to_string_lossy().to_string(),
                mount_point: disk.mount_point().to_string_lossy().to_string(),
                file_system: disk.file_system().to_string_lossy().to_string(),
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .collect())
    }

    async fn network(&self) -> anyhow::Result<Vec<NetworkSample>> {
        let networks = Networks::new_with_refreshed_list();

        Ok(networks
            .iter()
            .map(|(name, data)| NetworkSample {
                iface: name.to_string(),
                counters: NetworkCounters {
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                    rx_errors: data.total_errors_on_received(),
                    tx_errors: data.total_errors_on_transmitted(),
                },
            })
            .collect())
    }

    async fn processes(&self) -> anyhow::Result<Vec<ProcessSample>> {
        let mut sys = self.sys.lock().await;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );

        Ok(sys
            .processes()
            .values()
            .map(|process| ProcessSample {
                pid: process.pid().as_u32(),
                name: process.name().to_string_lossy().to_string(),
                cmdline: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect())
    }
}

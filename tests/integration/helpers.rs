//! Shared fixtures: a scripted metric provider, recording transports and a
//! harness wiring them into a scheduler with a manual clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hostguard::alerts::{Alert, AlertDispatcher, Notifier};
use hostguard::checks::{CheckContext, CheckKind};
use hostguard::config::{Config, ResolvedConfig, ScanIntervals};
use hostguard::monitors::snapshot::NetworkCounters;
use hostguard::provider::{
    CpuSample, DiskSample, MemorySample, MetricProvider, NetworkSample, ProcessSample,
};
use hostguard::scheduler::{RunSummary, Scheduler};
use hostguard::service_manager::ServiceManager;
use hostguard::state::ManualClock;
use hostguard::tasks::BackgroundTasks;
use tempfile::TempDir;

pub const START: i64 = 1_700_000_000;
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Metric provider returning whatever the test scripted
#[derive(Default)]
pub struct FakeProvider {
    pub memory: Mutex<MemorySample>,
    pub cpu: Mutex<CpuSample>,
    pub disks: Mutex<Vec<DiskSample>>,
    /// consumed front to back, one entry per `network()` call
    pub network: Mutex<VecDeque<Vec<NetworkSample>>>,
    pub processes: Mutex<Vec<ProcessSample>>,
    pub fail_memory: Mutex<bool>,
}

impl FakeProvider {
    pub fn set_memory_percent(&self, used_pct: u64) {
        *self.memory.lock().unwrap() = MemorySample {
            total: 100 * GIB,
            used: used_pct * GIB,
            total_swap: 0,
            used_swap: 0,
        };
    }

    pub fn push_network(&self, samples: Vec<(&str, NetworkCounters)>) {
        self.network.lock().unwrap().push_back(
            samples
                .into_iter()
                .map(|(iface, counters)| NetworkSample {
                    iface: iface.to_string(),
                    counters,
                })
                .collect(),
        );
    }
}

#[async_trait]
impl MetricProvider for FakeProvider {
    async fn memory(&self) -> anyhow::Result<MemorySample> {
        if *self.fail_memory.lock().unwrap() {
            anyhow::bail!("meminfo unavailable");
        }
        Ok(self.memory.lock().unwrap().clone())
    }

    async fn cpu(&self) -> anyhow::Result<CpuSample> {
        Ok(self.cpu.lock().unwrap().clone())
    }

    async fn disks(&self) -> anyhow::Result<Vec<DiskSample>> {
        Ok(self.disks.lock().unwrap().clone())
    }

    async fn network(&self) -> anyhow::Result<Vec<NetworkSample>> {
        self.network
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no network sample scripted"))
    }

    async fn processes(&self) -> anyhow::Result<Vec<ProcessSample>> {
        Ok(self.processes.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|alert| alert.subject.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Alert> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingServiceManager {
    pub restarted: Mutex<Vec<String>>,
}

#[async_trait]
impl ServiceManager for RecordingServiceManager {
    fn name(&self) -> &str {
        "recording"
    }

    async fn restart(&self, service: &str) -> anyhow::Result<()> {
        self.restarted.lock().unwrap().push(service.to_string());
        Ok(())
    }
}

/// Scan intervals of zero so every check runs on every invocation
pub fn always_scan() -> ScanIntervals {
    ScanIntervals {
        memory: 0,
        cpu: 0,
        disk: 0,
        dirs: 0,
        servers: 0,
        services: 0,
        network: 0,
    }
}

/// Raw config rooted in `dir`, scans always due
pub fn base_config(dir: &TempDir) -> Config {
    Config {
        state_dir: Some(dir.path().join("state")),
        hostname: Some("test-host".to_string()),
        intervals: always_scan(),
        ..Config::default()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub clock: ManualClock,
    pub provider: Arc<FakeProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub manager: Arc<RecordingServiceManager>,
    pub scheduler: Scheduler,
}

impl Harness {
    /// Defaults with scans always due; `tweak` adjusts the resolved config.
    pub fn new(tweak: impl FnOnce(&mut ResolvedConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(&dir).resolve(dir.path()).unwrap();
        tweak(&mut config);

        Self::with_config(dir, config)
    }

    pub fn with_config(dir: TempDir, config: ResolvedConfig) -> Self {
        let clock = ManualClock::new(START);
        let provider = Arc::new(FakeProvider::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = Arc::new(RecordingServiceManager::default());
        let tasks = Arc::new(BackgroundTasks::new());

        let transports: Vec<Arc<dyn Notifier>> = vec![notifier.clone()];
        let alerts = AlertDispatcher::new(
            transports,
            tasks.clone(),
            &config.recipient,
            &config.hostname,
        );
        let scheduler = Scheduler::assemble(
            Arc::new(config),
            Arc::new(clock.clone()),
            provider.clone(),
            manager.clone(),
            alerts,
            tasks,
        )
        .unwrap();

        Self {
            dir,
            clock,
            provider,
            notifier,
            manager,
            scheduler,
        }
    }

    pub async fn run(&self, kind: CheckKind) -> RunSummary {
        self.scheduler.run(&[kind]).await
    }

    pub fn context(&self) -> &CheckContext {
        self.scheduler.context()
    }
}

//! Runnable checks
//!
//! Every check implements [`Check`] and is registered under a [`CheckKind`].
//! A check only runs when its scan key (`<name>_check`) is due; once running
//! it samples through the [`MetricProvider`], classifies, and asks the throttle
//! again before each alert.
//!
//! ```text
//! scheduler ─▶ throttle "<name>_check" ─▶ Check::run ─▶ provider / probes
//!                                              │
//!                           thresholds / manifest / snapshot diff
//!                                              │
//!                               throttle "<name>_email[_severity]"
//!                                              │
//!                                       AlertDispatcher
//! ```

pub mod cpu;
pub mod dirs;
pub mod disk;
pub mod memory;
pub mod network;
pub mod servers;
pub mod services;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, trace, warn};

use crate::alerts::AlertDispatcher;
use crate::config::ResolvedConfig;
use crate::monitors::thresholds::{Severity, Threshold, ThresholdEvaluator};
use crate::provider::MetricProvider;
use crate::service_manager::ServiceManager;
use crate::state::{ManifestStore, ThrottleStore};
use crate::tasks::BackgroundTasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckKind {
    Memory,
    Cpu,
    Disk,
    Dirs,
    Servers,
    Services,
    Network,
}

impl CheckKind {
    pub const ALL: [CheckKind; 7] = [
        CheckKind::Memory,
        CheckKind::Cpu,
        CheckKind::Disk,
        CheckKind::Dirs,
        CheckKind::Servers,
        CheckKind::Services,
        CheckKind::Network,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Memory => "mem",
            CheckKind::Cpu => "cpu",
            CheckKind::Disk => "disk",
            CheckKind::Dirs => "dirs",
            CheckKind::Servers => "servers",
            CheckKind::Services => "services",
            CheckKind::Network => "net",
        }
    }

    /// Throttle key gating whether a scan runs at all
    pub fn scan_key(&self) -> String {
        format!("{}_check", self.name())
    }

    /// Throttle key (prefix, for tiered checks) gating alerts
    pub fn alert_key(&self) -> String {
        alert_key(self.name())
    }
}

/// Alert key prefix for `resource`; swap shares the memory check but keeps
/// its own keys.
pub fn alert_key(resource: &str) -> String {
    format!("{resource}_email")
}

/// Resource name used for swap alerts
pub const SWAP: &str = "swap";

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a check may touch during one invocation
#[derive(Clone)]
pub struct CheckContext {
    pub config: Arc<ResolvedConfig>,
    pub throttle: ThrottleStore,
    pub manifests: ManifestStore,
    pub evaluator: ThresholdEvaluator,
    pub alerts: AlertDispatcher,
    pub provider: Arc<dyn MetricProvider>,
    pub service_manager: Arc<dyn ServiceManager>,
    pub tasks: Arc<BackgroundTasks>,
}

/// What one check run found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Highest severity seen, `None` when nothing was evaluated
    pub worst: Option<Severity>,
    pub alerts_sent: usize,
    /// Alert conditions held back by a cool-down
    pub alerts_held: usize,
}

impl CheckOutcome {
    pub fn healthy() -> Self {
        Self {
            worst: Some(Severity::Ok),
            ..Self::default()
        }
    }

    pub fn record(&mut self, severity: Severity, notified: bool) {
        self.worst = self.worst.max(Some(severity));
        if severity != Severity::Ok {
            if notified {
                self.alerts_sent += 1;
            } else {
                self.alerts_held += 1;
            }
        }
    }
}

#[async_trait]
pub trait Check: Send + Sync {
    fn kind(&self) -> CheckKind;

    /// Seconds between scans
    fn interval(&self, config: &ResolvedConfig) -> u64;

    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome>;
}

/// Every check, keyed by kind
pub fn registry() -> BTreeMap<CheckKind, Box<dyn Check>> {
    let checks: Vec<Box<dyn Check>> = vec![
        Box::new(memory::MemoryCheck),
        Box::new(cpu::CpuCheck),
        Box::new(disk::DiskCheck),
        Box::new(dirs::DirsCheck),
        Box::new(servers::ServersCheck),
        Box::new(services::ServicesCheck),
        Box::new(network::NetworkCheck),
    ];

    checks.into_iter().map(|check| (check.kind(), check)).collect()
}

/// Classify one percentage, log it at its severity, and send an alert when the
/// severity's throttle allows it.
pub(crate) fn evaluate_and_alert(
    ctx: &CheckContext,
    outcome: &mut CheckOutcome,
    key_prefix: &str,
    label: &str,
    value: f64,
    threshold: &Threshold,
    body: &str,
) {
    let evaluation = ctx.evaluator.evaluate(key_prefix, value, threshold);
    let shown = value.trunc();

    match evaluation.severity {
        Severity::Ok => trace!("{label} usage {value:.1}% ok"),
        Severity::Warning => warn!("{label} usage {shown}% reached warning level {}%", threshold.warning),
        Severity::Critical => error!("{label} usage {shown}% reached critical level {}%", threshold.critical),
    }

    if evaluation.notify {
        ctx.alerts.dispatch(
            &format!("{}: {label} usage at {shown}%", evaluation.severity),
            body,
        );
    }

    outcome.record(evaluation.severity, evaluation.notify);
}

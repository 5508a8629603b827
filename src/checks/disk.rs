use async_trait::async_trait;
use tracing::{error, instrument, trace, warn};

use super::{Check, CheckContext, CheckKind, CheckOutcome};
use crate::config::ResolvedConfig;
use crate::monitors::thresholds::Severity;
use crate::provider::DiskSample;

/// Per-filesystem usage. Every device is classified on its own, but a scan
/// raises at most one warning and one critical alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskCheck;

#[async_trait]
impl Check for DiskCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Disk
    }

    fn interval(&self, config: &ResolvedConfig) -> u64 {
        config.intervals.disk
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome> {
        let threshold = ctx.config.disk;
        let mut critical: Vec<DiskSample> = Vec::new();
        let mut warning: Vec<DiskSample> = Vec::new();
        let mut outcome = CheckOutcome::healthy();

        for disk in ctx.provider.disks().await? {
            if disk.is_temporary() {
                trace!("skipping temporary filesystem {}", disk.mount_point);
                continue;
            }

            match threshold.classify(disk.usage_percent()) {
                Severity::Ok => trace!("{}", disk.report_line()),
                Severity::Warning => {
                    warn!("disk warning: {}", disk.report_line());
                    warning.push(disk);
                }
                Severity::Critical => {
                    error!("disk critical: {}", disk.report_line());
                    critical.push(disk);
                }
            }
        }

        let prefix = CheckKind::Disk.alert_key();
        for (severity, disks) in [(Severity::Critical, &critical), (Severity::Warning, &warning)] {
            // the first offending device frames the subject
            let Some(first) = disks.first() else {
                continue;
            };

            let notify = ctx.evaluator.may_notify(&prefix, severity, &threshold);
            if notify {
                ctx.alerts.dispatch(&subject(severity, first, disks.len()), body(disks));
            }
            outcome.record(severity, notify);
        }

        Ok(outcome)
    }
}

fn subject(severity: Severity, first: &DiskSample, count: usize) -> String {
    let mut subject = format!(
        "{severity}: disk {} at {}%",
        first.mount_point,
        first.usage_percent().trunc()
    );
    if count > 1 {
        subject.push_str(&format!(" (+{} more)", count - 1));
    }
    subject
}

fn body(disks: &[DiskSample]) -> String {
    disks.iter().map(|disk| disk.report_line() + "\n").collect()
}

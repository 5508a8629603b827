use anyhow::Context;
use async_trait::async_trait;
use tracing::{info, instrument, trace, warn};

use super::{Check, CheckContext, CheckKind, CheckOutcome};
use crate::config::ResolvedConfig;
use crate::monitors::thresholds::Severity;
use crate::state::{Manifest, Reconciliation};

/// Name of the baseline covering all watched roots
pub const BASELINE: &str = "dirs";

/// Content-hash drift in the watched directories
#[derive(Debug, Clone, Copy, Default)]
pub struct DirsCheck;

#[async_trait]
impl Check for DirsCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Dirs
    }

    fn interval(&self, config: &ResolvedConfig) -> u64 {
        config.intervals.dirs
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome> {
        let roots = ctx.config.watched_dirs.clone();
        if roots.is_empty() {
            trace!("no watched directories configured");
            return Ok(CheckOutcome::healthy());
        }

        let ctx = ctx.clone();
        // hashing and the manifest lock both block
        tokio::task::spawn_blocking(move || scan(&ctx, &roots))
            .await
            .context("directory scan task failed")?
    }
}

fn scan(ctx: &CheckContext, roots: &[std::path::PathBuf]) -> anyhow::Result<CheckOutcome> {
    let fresh = Manifest::compute(roots);
    trace!("hashed {} files under {} roots", fresh.len(), roots.len());

    let interval = ctx.config.alert_intervals.dirs;
    let reconciliation = ctx.manifests.reconcile(BASELINE, fresh, |diff| {
        warn!("watched directories changed: {} lines differ", diff.len());
        if !ctx.throttle.should_run(&CheckKind::Dirs.alert_key(), interval) {
            return false;
        }
        ctx.alerts.dispatch(
            &format!("WARNING: watched directories changed ({} entries)", diff.len()),
            diff.render(),
        );
        true
    })?;

    let mut outcome = CheckOutcome::healthy();
    match reconciliation {
        Reconciliation::Baseline { files } => info!("stored new baseline of {files} files"),
        Reconciliation::Unchanged => trace!("no changes"),
        Reconciliation::Alerted(_) => outcome.record(Severity::Warning, true),
        Reconciliation::Suppressed(_) => outcome.record(Severity::Warning, false),
    }
    Ok(outcome)
}

use async_trait::async_trait;
use tracing::instrument;

use super::{Check, CheckContext, CheckKind, CheckOutcome, evaluate_and_alert};
use crate::config::ResolvedConfig;

/// Average busy percentage across all cores
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuCheck;

#[async_trait]
impl Check for CpuCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Cpu
    }

    fn interval(&self, config: &ResolvedConfig) -> u64 {
        config.intervals.cpu
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome> {
        let sample = ctx.provider.cpu().await?;
        let mut outcome = CheckOutcome::default();

        evaluate_and_alert(
            ctx,
            &mut outcome,
            &CheckKind::Cpu.alert_key(),
            "cpu",
            sample.average(),
            &ctx.config.cpu,
            &sample.report(),
        );

        Ok(outcome)
    }
}

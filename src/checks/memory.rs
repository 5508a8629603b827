use async_trait::async_trait;
use tracing::instrument;

use super::{Check, CheckContext, CheckKind, CheckOutcome, SWAP, alert_key, evaluate_and_alert};
use crate::config::ResolvedConfig;

/// Memory and swap usage, each with its own warning/critical keys
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryCheck;

#[async_trait]
impl Check for MemoryCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Memory
    }

    fn interval(&self, config: &ResolvedConfig) -> u64 {
        config.intervals.memory
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome> {
        let sample = ctx.provider.memory().await?;
        let report = sample.report();
        let mut outcome = CheckOutcome::default();

        evaluate_and_alert(
            ctx,
            &mut outcome,
            &CheckKind::Memory.alert_key(),
            "memory",
            sample.usage_percent(),
            &ctx.config.memory,
            &report,
        );

        if sample.total_swap > 0 {
            evaluate_and_alert(
                ctx,
                &mut outcome,
                &alert_key(SWAP),
                SWAP,
                sample.swap_percent(),
                &ctx.config.swap,
                &report,
            );
        }

        Ok(outcome)
    }
}

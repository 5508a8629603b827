use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, trace, warn};

use super::{Check, CheckContext, CheckKind, CheckOutcome};
use crate::config::{NetworkConfig, ResolvedConfig};
use crate::monitors::snapshot::{self, NetworkDelta};
use crate::monitors::thresholds::Severity;
use crate::provider::NetworkSample;

/// Interface throughput and error counters over a short sampling window
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkCheck;

#[async_trait]
impl Check for NetworkCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Network
    }

    fn interval(&self, config: &ResolvedConfig) -> u64 {
        config.intervals.network
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome> {
        let settings = &ctx.config.network;

        let before = NetworkSample::snapshot(ctx.provider.network().await?);
        tokio::time::sleep(Duration::from_secs(settings.window_secs)).await;
        let after = NetworkSample::snapshot(ctx.provider.network().await?);

        let deltas = snapshot::diff(&before, &after, settings.window_secs);

        let triggered: Vec<(String, NetworkDelta)> = deltas
            .into_iter()
            .filter(|(iface, _)| is_monitored(settings, iface))
            .inspect(|(iface, delta)| trace!("{iface}: {delta:?}"))
            .filter(|(_, delta)| delta.has_errors() || delta.exceeds(settings.threshold_kib))
            .inspect(|(iface, delta)| warn!("{iface}: {}", describe(delta, settings.threshold_kib)))
            .collect();

        let mut outcome = CheckOutcome::healthy();
        if triggered.is_empty() {
            return Ok(outcome);
        }

        let notify = ctx
            .throttle
            .should_run(&CheckKind::Network.alert_key(), ctx.config.alert_intervals.network);
        if notify {
            let names: Vec<&str> = triggered.iter().map(|(iface, _)| iface.as_str()).collect();
            let body: String = triggered
                .iter()
                .map(|(iface, delta)| {
                    format!(
                        "{iface}: rx {} KiB/s, tx {} KiB/s, rx errors +{}, tx errors +{}\n",
                        delta.rx_kib_per_sec, delta.tx_kib_per_sec, delta.rx_errors, delta.tx_errors
                    )
                })
                .collect();
            ctx.alerts
                .dispatch(&format!("WARNING: network anomaly on {}", names.join(", ")), body);
        }
        outcome.record(Severity::Warning, notify);

        Ok(outcome)
    }
}

/// Loopback is skipped unless it is named in an explicit allow-list.
pub fn is_monitored(settings: &NetworkConfig, iface: &str) -> bool {
    if !settings.interfaces.is_empty() {
        return settings.interfaces.iter().any(|allowed| allowed == iface);
    }
    !is_loopback(iface)
}

fn is_loopback(iface: &str) -> bool {
    iface
        .strip_prefix("lo")
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

fn describe(delta: &NetworkDelta, threshold_kib: u64) -> String {
    let mut reasons = Vec::new();
    if delta.rx_errors > 0 || delta.tx_errors > 0 {
        reasons.push(format!("errors rx +{} tx +{}", delta.rx_errors, delta.tx_errors));
    }
    if delta.exceeds(threshold_kib) {
        reasons.push(format!(
            "throughput rx {} KiB/s tx {} KiB/s (limit {threshold_kib} KiB/s)",
            delta.rx_kib_per_sec, delta.tx_kib_per_sec
        ));
    }
    reasons.join("; ")
}

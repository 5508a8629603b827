use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, instrument, trace};

use super::{Check, CheckContext, CheckKind, CheckOutcome};
use crate::config::{ResolvedConfig, ServerEndpoint};
use crate::monitors::thresholds::Severity;

/// Reachability of remote endpoints: TCP connect when a port is configured,
/// a single ICMP echo otherwise. Probes run concurrently up to the configured
/// limit, each bounded by its own timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServersCheck;

#[async_trait]
impl Check for ServersCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Servers
    }

    fn interval(&self, config: &ResolvedConfig) -> u64 {
        config.intervals.servers
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome> {
        let endpoints = &ctx.config.endpoints;
        if endpoints.is_empty() {
            trace!("no endpoints configured");
            return Ok(CheckOutcome::healthy());
        }

        let prober = Prober::new(Duration::from_secs(ctx.config.servers.timeout_secs));
        let results = prober.probe_all(endpoints, ctx.config.servers.concurrency).await;

        let unreachable: Vec<(ServerEndpoint, String)> = results
            .into_iter()
            .filter_map(|(endpoint, result)| result.err().map(|reason| (endpoint, reason)))
            .inspect(|(endpoint, reason)| error!("{endpoint} unreachable: {reason}"))
            .collect();

        let mut outcome = CheckOutcome::healthy();
        if unreachable.is_empty() {
            return Ok(outcome);
        }

        let notify = ctx
            .throttle
            .should_run(&CheckKind::Servers.alert_key(), ctx.config.alert_intervals.servers);
        if notify {
            let body: String = unreachable
                .iter()
                .map(|(endpoint, reason)| format!("{endpoint}: {reason}\n"))
                .collect();
            ctx.alerts.dispatch(
                &format!("CRITICAL: {} of {} servers unreachable", unreachable.len(), endpoints.len()),
                body,
            );
        }
        outcome.record(Severity::Critical, notify);

        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Prober {
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probe every endpoint, at most `concurrency` at a time. Results keep the
    /// input order.
    pub async fn probe_all(
        &self,
        endpoints: &[ServerEndpoint],
        concurrency: usize,
    ) -> Vec<(ServerEndpoint, Result<(), String>)> {
        stream::iter(endpoints.iter().cloned())
            .map(|endpoint| async move {
                let result = self.probe(&endpoint).await;
                (endpoint, result)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    pub async fn probe(&self, endpoint: &ServerEndpoint) -> Result<(), String> {
        match endpoint.port {
            Some(port) => self.tcp(&endpoint.host, port).await,
            None => self.icmp(&endpoint.host).await,
        }
    }

    async fn tcp(&self, host: &str, port: u16) -> Result<(), String> {
        // resolution happens inside connect, so the timeout covers it too
        match timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => {
                trace!("{host}:{port} accepted connection");
                Ok(())
            }
            Ok(Err(e)) => Err(format!("connect failed: {e}")),
            Err(_) => Err(format!("connect timed out after {}s", self.timeout.as_secs())),
        }
    }

    async fn icmp(&self, host: &str) -> Result<(), String> {
        let wait = self.timeout.as_secs().max(1).to_string();
        let ping = Command::new("ping")
            .args(["-c", "1", "-W", &wait, host])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(self.timeout + Duration::from_secs(1), ping).await {
            Ok(Ok(status)) if status.success() => {
                trace!("{host} answered echo");
                Ok(())
            }
            Ok(Ok(status)) => Err(format!("no echo reply ({status})")),
            Ok(Err(e)) => Err(format!("ping unavailable: {e}")),
            Err(_) => Err(format!("echo timed out after {}s", self.timeout.as_secs())),
        }
    }
}

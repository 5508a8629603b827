use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{error, info, instrument, trace, warn};

use super::{Check, CheckContext, CheckKind, CheckOutcome};
use crate::config::{ResolvedConfig, RestartDirective, ServiceSpec};
use crate::monitors::thresholds::Severity;
use crate::provider::ProcessSample;

/// Liveness of local services, judged by a pattern match over the process
/// table. Down services are restarted per their directive and reported in
/// one aggregate alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServicesCheck;

#[async_trait]
impl Check for ServicesCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Services
    }

    fn interval(&self, config: &ResolvedConfig) -> u64 {
        config.intervals.services
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &CheckContext) -> anyhow::Result<CheckOutcome> {
        let specs = &ctx.config.services;
        if specs.is_empty() {
            trace!("no services configured");
            return Ok(CheckOutcome::healthy());
        }

        let processes = ctx.provider.processes().await?;
        let own_pid = std::process::id();

        let mut down = Vec::new();
        for spec in specs {
            let matcher = ProcessMatcher::new(&spec.pattern);
            if matcher.any_alive(&processes, own_pid) {
                trace!("{} is running", spec.name);
                continue;
            }

            error!("{} is down (no process matches {:?})", spec.name, spec.pattern);
            let action = recover(ctx, spec);
            down.push(format!("{} ({}): {action}\n", spec.name, spec.pattern));
        }

        let mut outcome = CheckOutcome::healthy();
        if down.is_empty() {
            return Ok(outcome);
        }

        let notify = ctx
            .throttle
            .should_run(&CheckKind::Services.alert_key(), ctx.config.alert_intervals.services);
        if notify {
            ctx.alerts.dispatch(
                &format!("CRITICAL: {} of {} services down", down.len(), specs.len()),
                down.concat(),
            );
        }
        outcome.record(Severity::Critical, notify);

        Ok(outcome)
    }
}

/// Kick off recovery without waiting for it. Returns a description for the
/// alert body.
fn recover(ctx: &CheckContext, spec: &ServiceSpec) -> String {
    match &spec.restart {
        RestartDirective::None => "no restart configured".to_string(),
        RestartDirective::Default => {
            let manager = ctx.service_manager.clone();
            let service = spec.name.clone();
            let action = format!("restart requested via {}", manager.name());
            ctx.tasks.spawn(format!("restart {service}"), async move {
                manager.restart(&service).await
            });
            action
        }
        RestartDirective::Command(command) => match spawn_detached(command) {
            Ok(()) => format!("started `{command}`"),
            Err(e) => {
                warn!("failed to start restart command for {}: {e}", spec.name);
                format!("restart command `{command}` failed to start: {e}")
            }
        },
    }
}

/// Run `command` through the shell in its own process group and forget it.
pub fn spawn_detached(command: &str) -> std::io::Result<()> {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()?;
    info!("started `{command}` (pid {:?})", child.id());
    Ok(())
}

/// Pattern over `"<name> <cmdline>"`: a regex when it compiles, a plain
/// substring otherwise
#[derive(Debug, Clone)]
pub enum ProcessMatcher {
    Regex(Regex),
    Substring(String),
}

impl ProcessMatcher {
    pub fn new(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => ProcessMatcher::Regex(re),
            Err(e) => {
                trace!("pattern {pattern:?} is not a regex ({e}), matching literally");
                ProcessMatcher::Substring(pattern.to_string())
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            ProcessMatcher::Regex(re) => re.is_match(text),
            ProcessMatcher::Substring(needle) => text.contains(needle.as_str()),
        }
    }

    pub fn any_alive(&self, processes: &[ProcessSample], own_pid: u32) -> bool {
        processes
            .iter()
            .filter(|process| process.pid != own_pid)
            .any(|process| self.is_match(&process.match_text()))
    }
}

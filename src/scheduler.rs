//! Scheduler - runs the selected checks for one invocation
//!
//! Checks run one after another. Each is gated by its scan key; a failing
//! check is logged and the rest still run. Before returning, the scheduler
//! waits (bounded) for background alert dispatches and restarts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument};

use crate::alerts::AlertDispatcher;
use crate::checks::{Check, CheckContext, CheckKind, CheckOutcome, registry};
use crate::config::ResolvedConfig;
use crate::monitors::thresholds::ThresholdEvaluator;
use crate::provider::MetricProvider;
use crate::service_manager::ServiceManager;
use crate::state::{self, Clock, StateResult};
use crate::tasks::BackgroundTasks;

/// How long to wait for in-flight dispatches before exiting
pub const DRAIN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// The scan key was not due yet
    Skipped,
    Completed(CheckOutcome),
    Failed(String),
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Skipped => write!(f, "skipped"),
            CheckStatus::Completed(outcome) => match outcome.worst {
                Some(worst) => write!(
                    f,
                    "{worst} ({} sent, {} held)",
                    outcome.alerts_sent, outcome.alerts_held
                ),
                None => write!(f, "done"),
            },
            CheckStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub results: Vec<(CheckKind, CheckStatus)>,
}

impl RunSummary {
    pub fn status(&self, kind: CheckKind) -> Option<&CheckStatus> {
        self.results
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, status)| status)
    }

    pub fn alerts_sent(&self) -> usize {
        self.results
            .iter()
            .filter_map(|(_, status)| match status {
                CheckStatus::Completed(outcome) => Some(outcome.alerts_sent),
                _ => None,
            })
            .sum()
    }
}

pub struct Scheduler {
    ctx: CheckContext,
    checks: BTreeMap<CheckKind, Box<dyn Check>>,
}

impl Scheduler {
    pub fn new(ctx: CheckContext) -> Self {
        Self {
            ctx,
            checks: registry(),
        }
    }

    /// Open the state stores under `config.state_dir` and wire up a context.
    pub fn assemble(
        config: Arc<ResolvedConfig>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn MetricProvider>,
        service_manager: Arc<dyn ServiceManager>,
        alerts: AlertDispatcher,
        tasks: Arc<BackgroundTasks>,
    ) -> StateResult<Self> {
        let (throttle, manifests) = state::open(&config.state_dir, clock)?;

        Ok(Self::new(CheckContext {
            evaluator: ThresholdEvaluator::new(throttle.clone()),
            config,
            throttle,
            manifests,
            alerts,
            provider,
            service_manager,
            tasks,
        }))
    }

    pub fn context(&self) -> &CheckContext {
        &self.ctx
    }

    /// Run `selection` in order, then wait for background work.
    #[instrument(skip_all)]
    pub async fn run(&self, selection: &[CheckKind]) -> RunSummary {
        let mut summary = RunSummary::default();

        for kind in selection {
            let status = self.run_one(*kind).await;
            info!("{kind}: {status}");
            summary.results.push((*kind, status));
        }

        self.ctx.tasks.drain(DRAIN_GRACE).await;
        summary
    }

    async fn run_one(&self, kind: CheckKind) -> CheckStatus {
        let Some(check) = self.checks.get(&kind) else {
            return CheckStatus::Failed("not registered".to_string());
        };

        if !self
            .ctx
            .throttle
            .should_run(&kind.scan_key(), check.interval(&self.ctx.config))
        {
            debug!("{kind}: scan not due");
            return CheckStatus::Skipped;
        }

        match check.run(&self.ctx).await {
            Ok(outcome) => CheckStatus::Completed(outcome),
            Err(e) => {
                error!("{kind} check failed: {e:#}");
                CheckStatus::Failed(format!("{e:#}"))
            }
        }
    }
}

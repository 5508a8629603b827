//! Two-tier threshold evaluation
//!
//! ```text
//! trunc(value) >= critical → Critical
//! trunc(value) >= warning  → Warning
//! otherwise                → Ok
//! ```
//!
//! Each severity has its own throttle key (`<prefix>_warning`,
//! `<prefix>_critical`) and its own re-notification interval, so escalating to
//! critical is never held back by a warning cool-down.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::state::ThrottleStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Warning/critical percentages with their re-notification intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: u32,
    pub critical: u32,
    /// Seconds between repeated warning alerts
    pub warning_interval: u64,
    /// Seconds between repeated critical alerts
    pub critical_interval: u64,
}

impl Threshold {
    pub fn new(warning: u32, critical: u32) -> Self {
        Self {
            warning,
            critical,
            warning_interval: 7200,
            critical_interval: 3600,
        }
    }

    pub fn with_intervals(mut self, warning_interval: u64, critical_interval: u64) -> Self {
        self.warning_interval = warning_interval;
        self.critical_interval = critical_interval;
        self
    }

    /// Classify a sample. The value is truncated toward zero first, so 74.99
    /// against a warning of 75 is still Ok.
    pub fn classify(&self, value: f64) -> Severity {
        if value.is_nan() {
            return Severity::Ok;
        }
        let value = value.trunc();

        if value >= f64::from(self.critical) {
            Severity::Critical
        } else if value >= f64::from(self.warning) {
            Severity::Warning
        } else {
            Severity::Ok
        }
    }

    pub fn interval(&self, severity: Severity) -> Option<u64> {
        match severity {
            Severity::Ok => None,
            Severity::Warning => Some(self.warning_interval),
            Severity::Critical => Some(self.critical_interval),
        }
    }
}

/// Result of evaluating one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub severity: Severity,
    /// Whether the throttle allowed an alert for this severity
    pub notify: bool,
}

#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    throttle: ThrottleStore,
}

impl ThresholdEvaluator {
    pub fn new(throttle: ThrottleStore) -> Self {
        Self { throttle }
    }

    /// Classify `value` and, for a non-Ok result, consult the throttle key for
    /// that severity.
    pub fn evaluate(&self, key_prefix: &str, value: f64, threshold: &Threshold) -> Evaluation {
        let severity = threshold.classify(value);
        let notify = self.may_notify(key_prefix, severity, threshold);

        trace!(
            "{key_prefix}: {value:.2}% vs {}/{} → {severity} (notify: {notify})",
            threshold.warning, threshold.critical
        );

        Evaluation { severity, notify }
    }

    /// Ask the throttle whether an alert at `severity` may go out now. Ok never
    /// notifies and never touches state.
    pub fn may_notify(&self, key_prefix: &str, severity: Severity, threshold: &Threshold) -> bool {
        let Some(interval) = threshold.interval(severity) else {
            return false;
        };

        let key = severity_key(key_prefix, severity);
        let notify = self.throttle.should_run(&key, interval);
        if !notify {
            debug!("{key}: alert held back by {interval}s cool-down");
        }
        notify
    }
}

/// Throttle key for alerts of `severity` under `prefix`
pub fn severity_key(prefix: &str, severity: Severity) -> String {
    match severity {
        Severity::Ok => format!("{prefix}_ok"),
        Severity::Warning => format!("{prefix}_warning"),
        Severity::Critical => format!("{prefix}_critical"),
    }
}

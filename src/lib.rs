//! Periodic host-health agent.
//!
//! Each invocation samples the selected resources, compares them against
//! configured limits, and sends alerts through throttles persisted on disk,
//! so the agent can run from cron every minute without flooding recipients.

pub mod alerts;
pub mod checks;
pub mod config;
pub mod logging;
pub mod monitors;
pub mod provider;
pub mod scheduler;
pub mod service_manager;
pub mod state;
pub mod tasks;
pub mod util;

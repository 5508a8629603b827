//! Service manager detection and restart requests

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::util::find_in_path;

/// Restarts OS services by name
#[async_trait]
pub trait ServiceManager: Send + Sync {
    fn name(&self) -> &str;

    async fn restart(&self, service: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    Systemd,
    SysV,
}

/// No usable service manager on this host; fatal for the whole invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoServiceManager;

impl fmt::Display for NoServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no usable service manager found (looked for systemctl and service in PATH)")
    }
}

impl std::error::Error for NoServiceManager {}

/// `systemctl restart <name>` or `service <name> restart`
#[derive(Debug, Clone)]
pub struct CommandServiceManager {
    kind: ManagerKind,
    program: PathBuf,
}

impl CommandServiceManager {
    pub fn new(kind: ManagerKind, program: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: program.into(),
        }
    }

    /// Prefer systemd, fall back to SysV init scripts.
    pub fn detect() -> Result<Self, NoServiceManager> {
        if let Some(program) = find_in_path("systemctl") {
            debug!("using systemd via {}", program.display());
            return Ok(Self::new(ManagerKind::Systemd, program));
        }
        if let Some(program) = find_in_path("service") {
            debug!("using SysV init via {}", program.display());
            return Ok(Self::new(ManagerKind::SysV, program));
        }
        Err(NoServiceManager)
    }

    pub fn kind(&self) -> ManagerKind {
        self.kind
    }

    fn args<'a>(&self, service: &'a str) -> [&'a str; 2] {
        match self.kind {
            ManagerKind::Systemd => ["restart", service],
            ManagerKind::SysV => [service, "restart"],
        }
    }
}

#[async_trait]
impl ServiceManager for CommandServiceManager {
    fn name(&self) -> &str {
        match self.kind {
            ManagerKind::Systemd => "systemd",
            ManagerKind::SysV => "sysv",
        }
    }

    async fn restart(&self, service: &str) -> anyhow::Result<()> {
        info!("restarting {service} via {}", self.name());

        let output = Command::new(&self.program)
            .args(self.args(service))
            .stdin(Stdio::null())
            .output()
            .await?;

        anyhow::ensure!(
            output.status.success(),
            "{} restart of {service} exited with {}: {}",
            self.name(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(())
    }
}

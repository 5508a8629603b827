use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::config::ResolvedConfig;
use crate::tasks::BackgroundTasks;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub subject: String,
    pub recipient: String,
    pub body: String,
    pub host: String,
    pub timestamp: DateTime<Utc>,
}

/// Alert transport
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Pipes the alert body into a command: `mail -s <subject> <recipient>` by
/// default, or a configured shell command that finds the subject and
/// recipient in `HOSTGUARD_SUBJECT` / `HOSTGUARD_RECIPIENT`.
#[derive(Debug, Clone, Default)]
pub struct CommandNotifier {
    command: Option<String>,
}

impl CommandNotifier {
    pub fn mail() -> Self {
        Self { command: None }
    }

    pub fn custom(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
        }
    }

    fn command(&self, alert: &Alert) -> Command {
        let mut cmd = match &self.command {
            Some(shell) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(shell);
                cmd
            }
            None => {
                let mut cmd = Command::new("mail");
                cmd.arg("-s").arg(&alert.subject).arg(&alert.recipient);
                cmd
            }
        };
        cmd.env("HOSTGUARD_SUBJECT", &alert.subject)
            .env("HOSTGUARD_RECIPIENT", &alert.recipient)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    fn name(&self) -> &str {
        if self.command.is_some() { "command" } else { "mail" }
    }

    #[instrument(skip_all, fields(subject = %alert.subject))]
    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let mut child = self
            .command(alert)
            .spawn()
            .with_context(|| format!("failed to start {} notifier", self.name()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(alert.body.as_bytes())
                .await
                .context("failed to write alert body")?;
        }

        let output = child.wait_with_output().await?;
        anyhow::ensure!(
            output.status.success(),
            "{} notifier exited with {}: {}",
            self.name(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );

        info!("Successfully sent {} alert", self.name());
        Ok(())
    }
}

/// Posts every alert as JSON to a URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip_all, fields(subject = %alert.subject))]
    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let payload = json!({
            "subject": alert.subject,
            "recipient": alert.recipient,
            "body": alert.body,
            "host": alert.host,
            "timestamp": alert.timestamp.to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send webhook alert")?;

        anyhow::ensure!(
            response.status().is_success(),
            "Webhook alert failed with status: {}",
            response.status()
        );

        info!("Successfully sent webhook alert");
        Ok(())
    }
}

/// Hands alerts to every transport without waiting for them
#[derive(Clone)]
pub struct AlertDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
    tasks: Arc<BackgroundTasks>,
    recipient: String,
    host: String,
}

impl AlertDispatcher {
    pub fn new(
        notifiers: Vec<Arc<dyn Notifier>>,
        tasks: Arc<BackgroundTasks>,
        recipient: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            notifiers,
            tasks,
            recipient: recipient.into(),
            host: host.into(),
        }
    }

    /// Transports configured for this host: mail or the custom command, plus
    /// the webhook when one is set.
    pub fn from_config(config: &ResolvedConfig, tasks: Arc<BackgroundTasks>) -> anyhow::Result<Self> {
        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![match &config.notify_command {
            Some(command) => Arc::new(CommandNotifier::custom(command)),
            None => Arc::new(CommandNotifier::mail()),
        }];

        if let Some(url) = &config.webhook_url {
            notifiers.push(Arc::new(WebhookNotifier::new(url)?));
        }

        Ok(Self::new(notifiers, tasks, &config.recipient, &config.hostname))
    }

    pub fn alert(&self, subject: &str, body: impl Into<String>) -> Alert {
        Alert {
            subject: format!("[{}] {subject}", self.host),
            recipient: self.recipient.clone(),
            body: body.into(),
            host: self.host.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Start delivery on every transport and return. Delivery failures are
    /// logged by the background task, never reported to the caller.
    pub fn dispatch(&self, subject: &str, body: impl Into<String>) {
        let alert = self.alert(subject, body);
        info!("alert: {}", alert.subject);

        for notifier in &self.notifiers {
            let notifier = notifier.clone();
            let alert = alert.clone();
            let label = format!("{} notifier", notifier.name());
            debug!("dispatching via {}", notifier.name());

            self.tasks
                .spawn(label, async move { notifier.send(&alert).await });
        }
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field(
                "notifiers",
                &self.notifiers.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .field("recipient", &self.recipient)
            .field("host", &self.host)
            .finish()
    }
}

//! Fire-and-forget background work
//!
//! Alert dispatches and restart commands are started here and never awaited
//! by the code that starts them. Failures are logged, never retried. The
//! scheduler drains the set once per invocation so the process does not exit
//! underneath a dispatch that is still in flight.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

#[derive(Debug, Default)]
pub struct BackgroundTasks {
    set: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `task` and return immediately. An `Err` is logged under `label`.
    pub fn spawn<F>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let label = label.into();
        let wrapped = async move {
            if let Err(e) = task.await {
                error!("{label}: {e:#}");
            }
        };

        match self.set.lock() {
            Ok(mut set) => {
                set.spawn(wrapped);
            }
            Err(poisoned) => {
                poisoned.into_inner().spawn(wrapped);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.set.lock().map(|set| set.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for everything started so far, giving up after `grace`.
    pub async fn drain(&self, grace: Duration) {
        let mut set = match self.set.lock() {
            Ok(mut set) => std::mem::take(&mut *set),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        if set.is_empty() {
            return;
        }
        debug!("waiting for {} background tasks", set.len());

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = set.join_next().await {
                if let Err(e) = result {
                    error!("background task panicked: {e}");
                }
            }
        })
        .await;

        if finished.is_err() {
            warn!("{} background tasks still running after {grace:?}, abandoning", set.len());
            set.detach_all();
        }
    }
}

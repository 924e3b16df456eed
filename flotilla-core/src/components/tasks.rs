//! Background periodic work owned by a component.
//!
//! Producer-style components fire work on an interval (emit a message, push
//! an object, refresh a fixture) for as long as they run. The task must die
//! before the underlying resource is released, so `stop` cancels and joins
//! it first.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// A cancellable task running `tick` on a fixed interval.
///
/// Tick errors are logged and do not stop the schedule. Cancellation is
/// best-effort: an in-flight tick is interrupted, not awaited to
/// completion.
#[derive(Debug)]
pub struct PeriodicTask {
    label: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn a task that runs `tick` every `period`, starting immediately.
    pub fn spawn<F, Fut>(label: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = crate::error::Result<()>> + Send,
    {
        let label = label.into();
        let token = CancellationToken::new();
        let task_label = label.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!(task = %task_label, "Periodic task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = tick().await {
                            error!(task = %task_label, error = %e, "Periodic task iteration failed");
                        }
                    }
                }
            }
        });
        Self { label, token, handle }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cancel the task and wait for it to finish.
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

//! Supervision of the background halves of async operations.

use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::BrokerError;
use crate::operation::{OperationKind, OperationTracker};

/// Tracks every background operation task the broker has started.
///
/// Each operation runs in its own task, wrapped by a supervisor that turns
/// the outcome (including a panic) into the terminal operation state.
/// Supervisors are detached: dropping the broker does not abort them, so an
/// operation still reaches its terminal state after the last handle is gone.
#[derive(Default)]
pub(crate) struct BackgroundTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundTasks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `work` for the operation `kind` on `instance_id` in the background.
    ///
    /// On success a provision is marked `succeeded`; a deprovision has
    /// deleted the record, so nothing is written. On error or panic the
    /// operation is marked `failed` on the still-existing record.
    pub(crate) async fn spawn_operation<F>(
        &self,
        tracker: OperationTracker,
        instance_id: String,
        kind: OperationKind,
        work: F,
    ) where
        F: Future<Output = Result<(), BrokerError>> + Send + 'static,
    {
        let supervisor = async move {
            let cause = match tokio::spawn(work).await {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(error_chain(&err)),
                Err(join_err) if join_err.is_panic() => {
                    Some("background task panicked".to_string())
                }
                Err(join_err) => Some(format!("background task cancelled: {join_err}")),
            };

            let update = match cause {
                None if kind == OperationKind::Deprovision => {
                    tracing::info!(instance_id = %instance_id, "deprovision complete");
                    return;
                }
                None => {
                    tracing::info!(instance_id = %instance_id, %kind, "operation succeeded");
                    tracker
                        .finish(&instance_id, true, kind.succeeded(&instance_id))
                        .await
                }
                Some(cause) => {
                    tracing::error!(instance_id = %instance_id, %kind, %cause, "operation failed");
                    tracker
                        .finish(&instance_id, false, kind.failed(&instance_id))
                        .await
                }
            };

            if let Err(e) = update {
                tracing::error!(
                    instance_id = %instance_id,
                    %kind,
                    error = %e,
                    "could not record operation state"
                );
            }
        };

        let handle = tokio::spawn(supervisor);
        let mut handles = self.handles.lock().await;
        // Forget supervisors that already finished so the list does not grow
        // for the lifetime of the process.
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Wait for every background operation started so far to finish.
    ///
    /// The lock is only held to take the pending handles, so operations can
    /// be started while a drain is waiting.
    pub(crate) async fn drain(&self) {
        loop {
            let pending = std::mem::take(&mut *self.handles.lock().await);
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "operation supervisor did not complete");
                }
            }
        }
    }
}

/// Render an error with its sources, e.g. `install release failed: chart not found`.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

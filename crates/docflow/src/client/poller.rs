use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::StatusSource;
use crate::workflow::WorkflowRun;

/// Fixed-cadence status poller.
///
/// Each cycle waits one interval, then awaits a single fetch, so there is
/// never more than one fetch in flight. The loop ends after the first
/// terminal snapshot has been handed to the observer.
pub struct StatusPoller;

impl StatusPoller {
    pub fn spawn<S, F>(source: Arc<S>, interval: Duration, mut observer: F) -> PollHandle
    where
        S: StatusSource + ?Sized,
        F: FnMut(&WorkflowRun) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match source.fetch().await {
                    Ok(Some(run)) => {
                        observer(&run);
                        if run.is_terminal() {
                            debug!(run_id = %run.id, status = %run.status, "Polling stopped");
                            return Some(run);
                        }
                    }
                    Ok(None) => debug!("No workflow run yet"),
                    Err(e) => warn!(error = %e, "Error polling workflow status"),
                }
            }
        });

        PollHandle {
            handle: Some(handle),
        }
    }
}

/// Owns the polling task. Dropping the handle stops the task.
pub struct PollHandle {
    handle: Option<JoinHandle<Option<WorkflowRun>>>,
}

impl PollHandle {
    /// Waits for the poller to observe a terminal run.
    pub async fn finished(mut self) -> Option<WorkflowRun> {
        let handle = self.handle.as_mut()?;
        let run = handle.await.ok().flatten();
        self.handle = None;
        run
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

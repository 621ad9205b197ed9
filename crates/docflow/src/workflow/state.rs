use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::run::WorkflowRun;

/// Holds the single current run.
///
/// Readers always get a cloned snapshot, so a reader never observes a
/// run between two writes. Writers hold the lock only for the length of
/// a copy.
#[derive(Clone, Default)]
pub struct WorkflowState {
    current: Arc<RwLock<Option<WorkflowRun>>>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new run for `subject_name`, replacing whatever was current.
    pub async fn create(&self, subject_name: &str) -> WorkflowRun {
        let run = WorkflowRun::new(subject_name);
        let mut current = self.current.write().await;
        if let Some(previous) = current.as_ref() {
            debug!(previous = %previous.id, next = %run.id, "Replacing current workflow run");
        }
        *current = Some(run.clone());
        run
    }

    pub async fn current(&self) -> Option<WorkflowRun> {
        self.current.read().await.clone()
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    /// Writes `run` back if it is still the current run.
    ///
    /// Returns false when the run was replaced or cleared in the meantime;
    /// the write is dropped in that case.
    pub async fn publish(&self, run: &WorkflowRun) -> bool {
        let mut current = self.current.write().await;
        match current.as_mut() {
            Some(existing) if existing.id == run.id => {
                *existing = run.clone();
                true
            }
            _ => false,
        }
    }
}

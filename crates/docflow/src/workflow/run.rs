use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::step::{catalogue, Step, StepId, StepStatus};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One execution of the pipeline.
///
/// All mutation goes through the methods below so that step statuses only
/// move forward and the overall status stays consistent with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: Uuid,
    pub subject_name: String,
    pub status: RunStatus,
    pub steps: Vec<Step>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Primary artifact link (the transferred file).
    pub link: Option<String>,
    /// Secondary artifact link (the container holding it).
    pub container_link: Option<String>,
}

impl WorkflowRun {
    /// New run with the trigger step already completed.
    pub fn new(subject_name: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut steps = catalogue();
        if let Some(trigger) = steps.iter_mut().find(|s| s.id == StepId::Trigger) {
            trigger.status = StepStatus::Completed;
            trigger.timestamp = Some(now);
        }

        Self {
            id: Uuid::new_v4(),
            subject_name: subject_name.into(),
            status: RunStatus::Running,
            steps,
            started_at: now,
            ended_at: None,
            error: None,
            link: None,
            container_link: None,
        }
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_status(&self, id: StepId) -> Option<StepStatus> {
        self.step(id).map(|s| s.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn running_step(&self) -> Option<StepId> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Running)
            .map(|s| s.id)
    }

    pub fn start_step(&mut self, id: StepId) -> Result<()> {
        self.transition(id, StepStatus::Running)
    }

    /// Marks the step completed. The run completes with the last step.
    pub fn complete_step(&mut self, id: StepId) -> Result<()> {
        self.transition(id, StepStatus::Completed)?;
        if self.steps.iter().all(|s| s.status == StepStatus::Completed) {
            self.status = RunStatus::Completed;
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn record_artifacts(&mut self, link: Option<String>, container_link: Option<String>) {
        self.link = link;
        self.container_link = container_link;
    }

    /// Fails the running step (if any) and the run as a whole.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let now = Utc::now();
        if let Some(step) = self
            .steps
            .iter_mut()
            .find(|s| s.status == StepStatus::Running)
        {
            step.status = StepStatus::Failed;
            step.timestamp = Some(now);
        }
        self.status = RunStatus::Failed;
        self.error = Some(message.into());
        self.ended_at = Some(now);
    }

    fn transition(&mut self, id: StepId, next: StepStatus) -> Result<()> {
        if self.is_terminal() {
            return Err(Error::Internal(format!(
                "run {} is already {}; cannot move step {} to {}",
                self.id, self.status, id, next
            )));
        }
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::Internal(format!("unknown step {}", id)))?;

        if !step.status.can_advance_to(next) {
            return Err(Error::Internal(format!(
                "step {} cannot move from {} to {}",
                id, step.status, next
            )));
        }

        step.status = next;
        if next.is_terminal() {
            step.timestamp = Some(Utc::now());
        }
        Ok(())
    }
}

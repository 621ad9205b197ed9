use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// The artifact is present locally; satisfied at trigger time.
    Trigger,
    Notify,
    PersistRemote,
}

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Trigger => "trigger",
            StepId::Notify => "notify",
            StepId::PersistRemote => "persist_remote",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StepId::Trigger => "File Upload",
            StepId::Notify => "Send Email",
            StepId::PersistRemote => "Create Drive Folder & Upload",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed pipeline, in human-facing order. Execution order differs:
/// the remote copy is made before the notification that links to it.
pub const PIPELINE: [StepId; 3] = [StepId::Trigger, StepId::Notify, StepId::PersistRemote];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }

    /// Statuses only move forward: pending -> running -> {completed | failed}.
    pub fn can_advance_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Failed)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub status: StepStatus,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Step {
    pub fn pending(id: StepId) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            status: StepStatus::Pending,
            timestamp: None,
        }
    }
}

/// Fresh step list for a new run, seeded from [`PIPELINE`].
pub fn catalogue() -> Vec<Step> {
    PIPELINE.iter().copied().map(Step::pending).collect()
}

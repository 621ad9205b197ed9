//! Client side of the status protocol: triggering an upload over HTTP and
//! polling the status endpoint until the run is terminal.

mod poller;

pub use poller::{PollHandle, StatusPoller};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;

use crate::server::{StatusResponse, UploadResponse};
use crate::workflow::{StepStatus, WorkflowRun};
use crate::{Error, Result};

/// Anything that can produce the current run snapshot.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<Option<WorkflowRun>>;
}

/// HTTP client for the trigger and status endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        // Uploads block until the run is terminal, so no overall timeout.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn upload(&self, path: &Path, recipient: &str) -> Result<UploadResponse> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation(format!("not a file: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name))
            .text("recipientEmail", recipient.to_string());

        let response = self
            .client
            .post(format!("{}/api/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: UploadResponse = response.json().await?;
        match status {
            StatusCode::BAD_REQUEST => return Err(Error::Validation(body.message)),
            StatusCode::PAYLOAD_TOO_LARGE => return Err(Error::TooLarge(body.message)),
            _ => {}
        }
        Ok(body)
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn fetch(&self) -> Result<Option<WorkflowRun>> {
        let response = self
            .client
            .get(format!("{}/api/workflow-status", self.base_url))
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?;
        let body: StatusResponse = response.json().await?;
        Ok(body.workflow)
    }
}

/// Human-readable lines for what changed between two snapshots.
pub fn describe_transitions(previous: Option<&WorkflowRun>, next: &WorkflowRun) -> Vec<String> {
    let previous = previous.filter(|p| p.id == next.id);
    let mut lines = Vec::new();

    if previous.is_none() {
        lines.push(format!("workflow {} for {}: {}", next.id, next.subject_name, next.status));
    }

    for step in &next.steps {
        let before = previous.and_then(|p| p.step_status(step.id));
        if before == Some(step.status) {
            continue;
        }
        if previous.is_none() && step.status == StepStatus::Pending {
            continue;
        }
        lines.push(format!("  {} -> {}", step.name, step.status));
    }

    if let Some(prev) = previous {
        if prev.status != next.status {
            lines.push(format!("workflow {}", next.status));
        }
    }
    if next.is_terminal() {
        if let Some(error) = &next.error {
            lines.push(format!("  error: {}", error));
        }
        if let Some(link) = &next.link {
            lines.push(format!("  link: {}", link));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepId;

    #[test]
    fn first_snapshot_lists_started_steps_only() {
        let run = WorkflowRun::new("report.pdf");
        let lines = describe_transitions(None, &run);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("report.pdf"));
        assert_eq!(lines[1], "  File Upload -> completed");
    }

    #[test]
    fn later_snapshots_report_only_changes() {
        let before = WorkflowRun::new("report.pdf");
        let mut after = before.clone();
        after.start_step(StepId::PersistRemote).unwrap();

        let lines = describe_transitions(Some(&before), &after);
        assert_eq!(lines, vec!["  Create Drive Folder & Upload -> running".to_string()]);
    }

    #[test]
    fn terminal_failure_reports_error() {
        let mut before = WorkflowRun::new("report.pdf");
        before.start_step(StepId::PersistRemote).unwrap();
        let mut after = before.clone();
        after.fail("Configuration error: no folder");

        let lines = describe_transitions(Some(&before), &after);
        assert!(lines.contains(&"workflow failed".to_string()));
        assert!(lines.contains(&"  error: Configuration error: no folder".to_string()));
    }

    #[test]
    fn a_different_run_is_treated_as_new() {
        let first = WorkflowRun::new("a.pdf");
        let second = WorkflowRun::new("b.pdf");
        let lines = describe_transitions(Some(&first), &second);
        assert!(lines[0].contains("b.pdf"));
    }
}

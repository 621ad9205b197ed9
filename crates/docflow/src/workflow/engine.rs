use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    collaborators::{Notifier, RemoteStore},
    metrics,
    workflow::{StepId, WorkflowRun, WorkflowState},
    Result,
};

/// Drives one run at a time through the pipeline.
///
/// Both trigger paths share one engine. `gate` serializes whole runs, so
/// a second trigger waits for the first run to reach a terminal status
/// before it creates its own run and becomes current.
pub struct WorkflowEngine {
    state: WorkflowState,
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    upload_dir: PathBuf,
    gate: Mutex<()>,
}

impl WorkflowEngine {
    pub fn new(
        state: WorkflowState,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state,
            remote,
            notifier,
            upload_dir: upload_dir.into(),
            gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Executes the pipeline for the artifact stored as `stored_name` in
    /// the upload directory and returns the terminal run.
    ///
    /// Collaborator failures never escape as `Err`; they end up in the
    /// returned run (`status`, `error`, the failed step).
    pub async fn execute(&self, stored_name: &str, recipient: &str) -> WorkflowRun {
        let _turn = self.gate.lock().await;

        let mut run = self.state.create(stored_name).await;
        metrics::RUNS_STARTED_TOTAL.inc();
        info!(run_id = %run.id, file = %stored_name, "Executing workflow");

        match self.drive(&mut run, stored_name, recipient).await {
            Ok(()) => {
                metrics::RUNS_COMPLETED_TOTAL.inc();
                info!(run_id = %run.id, "Workflow executed successfully");
            }
            Err(e) => {
                let failed_step = run.running_step();
                run.fail(e.to_string());
                self.state.publish(&run).await;
                metrics::RUNS_FAILED_TOTAL.inc();
                error!(
                    run_id = %run.id,
                    step = ?failed_step,
                    error = %e,
                    "Error executing workflow"
                );
            }
        }

        run
    }

    async fn drive(&self, run: &mut WorkflowRun, stored_name: &str, recipient: &str) -> Result<()> {
        let display = display_name(stored_name);
        let container = container_name(display);
        let local_path = self.upload_dir.join(stored_name);

        // The remote copy comes first so the notification can carry its link.
        run.start_step(StepId::PersistRemote)?;
        self.state.publish(run).await;
        info!(run_id = %run.id, folder = %container, "Uploading to remote storage");

        let folder = self.remote.ensure_container(&container).await?;
        let artifact = self
            .remote
            .transfer_artifact(&local_path, display, &folder)
            .await?;

        run.record_artifacts(Some(artifact.link.clone()), artifact.container_link.clone());
        run.complete_step(StepId::PersistRemote)?;
        self.state.publish(run).await;
        info!(run_id = %run.id, link = %artifact.link, "File persisted remotely");

        self.cleanup(&local_path).await;

        run.start_step(StepId::Notify)?;
        self.state.publish(run).await;
        info!(run_id = %run.id, recipient = %recipient, "Sending email notification");

        self.notifier.notify(display, recipient, &artifact.link).await?;

        run.complete_step(StepId::Notify)?;
        self.state.publish(run).await;
        Ok(())
    }

    async fn cleanup(&self, local_path: &Path) {
        match tokio::fs::remove_file(local_path).await {
            Ok(()) => info!(path = %local_path.display(), "Deleted local file"),
            Err(e) => warn!(
                path = %local_path.display(),
                error = %e,
                "Could not delete local file"
            ),
        }
    }
}

/// Name shown to people: the stored name without its `{millis}-` prefix.
pub fn display_name(stored_name: &str) -> &str {
    match stored_name.split_once('-') {
        Some((prefix, rest))
            if !prefix.is_empty()
                && !rest.is_empty()
                && prefix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest
        }
        _ => stored_name,
    }
}

/// Remote folder name for a document: its file stem.
pub fn container_name(display_name: &str) -> String {
    Path::new(display_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| display_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        ContainerRef, Delivery, MockNotifier, MockRemoteStore, TransferredArtifact,
    };
    use crate::workflow::{RunStatus, StepStatus};
    use crate::Error;
    use mockall::predicate::eq;

    fn folder(name: &str) -> ContainerRef {
        ContainerRef {
            id: "folder-1".to_string(),
            name: name.to_string(),
            link: Some("https://drive.test/folders/folder-1".to_string()),
        }
    }

    fn engine(remote: MockRemoteStore, notifier: MockNotifier, dir: &Path) -> WorkflowEngine {
        WorkflowEngine::new(WorkflowState::new(), Arc::new(remote), Arc::new(notifier), dir)
    }

    #[test]
    fn display_name_strips_timestamp_prefix() {
        assert_eq!(display_name("1700000000000-report.pdf"), "report.pdf");
        assert_eq!(display_name("1700000000000-my-report.pdf"), "my-report.pdf");
        assert_eq!(display_name("report.pdf"), "report.pdf");
        assert_eq!(display_name("draft-report.pdf"), "draft-report.pdf");
        assert_eq!(display_name("123-"), "123-");
    }

    #[test]
    fn container_name_is_file_stem() {
        assert_eq!(container_name("report.pdf"), "report");
        assert_eq!(container_name("archive.tar.gz"), "archive.tar");
        assert_eq!(container_name("README"), "README");
    }

    #[tokio::test]
    async fn successful_run_persists_then_notifies_with_link() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"%PDF").unwrap();

        let mut remote = MockRemoteStore::new();
        remote
            .expect_ensure_container()
            .with(eq("report"))
            .times(1)
            .returning(|name| Ok(folder(name)));
        remote
            .expect_transfer_artifact()
            .withf(|path, name, container| {
                path.ends_with("report.pdf")
                    && name.to_string() == "report.pdf"
                    && container.id == "folder-1"
            })
            .times(1)
            .returning(|_, _, container| {
                Ok(TransferredArtifact {
                    id: "file-1".to_string(),
                    link: "https://drive.test/file-1".to_string(),
                    container_link: container.link.clone(),
                })
            });

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .with(eq("report.pdf"), eq("ops@example.com"), eq("https://drive.test/file-1"))
            .times(1)
            .returning(|_, recipient, _| {
                Ok(Delivery {
                    recipient: recipient.to_string(),
                    message_id: Some("m-1".to_string()),
                })
            });

        let engine = engine(remote, notifier, dir.path());
        let run = engine.execute("report.pdf", "ops@example.com").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.steps.iter().all(|s| s.status == StepStatus::Completed));
        assert!(run.steps.iter().all(|s| s.timestamp.is_some()));
        assert_eq!(run.link.as_deref(), Some("https://drive.test/file-1"));
        assert_eq!(run.container_link.as_deref(), Some("https://drive.test/folders/folder-1"));
        assert!(run.error.is_none());
        assert!(run.ended_at.is_some());
        assert!(!dir.path().join("report.pdf").exists());

        assert_eq!(engine.state().current().await, Some(run));
    }

    #[tokio::test]
    async fn remote_failure_skips_notification() {
        let dir = tempfile::tempdir().unwrap();

        let mut remote = MockRemoteStore::new();
        remote
            .expect_ensure_container()
            .returning(|_| Err(Error::Config("DRIVE_FOLDER_ID is not set".to_string())));
        remote.expect_transfer_artifact().times(0);

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let engine = engine(remote, notifier, dir.path());
        let run = engine.execute("report.pdf", "ops@example.com").await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step_status(StepId::PersistRemote), Some(StepStatus::Failed));
        assert_eq!(run.step_status(StepId::Notify), Some(StepStatus::Pending));
        assert!(run.step(StepId::PersistRemote).unwrap().timestamp.is_some());
        assert!(run.error.as_deref().unwrap().contains("DRIVE_FOLDER_ID"));
        assert!(run.link.is_none());
    }

    #[tokio::test]
    async fn notification_failure_keeps_completed_upload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"%PDF").unwrap();

        let mut remote = MockRemoteStore::new();
        remote.expect_ensure_container().returning(|name| Ok(folder(name)));
        remote.expect_transfer_artifact().returning(|_, _, _| {
            Ok(TransferredArtifact {
                id: "file-1".to_string(),
                link: "https://drive.test/file-1".to_string(),
                container_link: None,
            })
        });

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_, _, _| Err(Error::Transport("relay refused".to_string())));

        let engine = engine(remote, notifier, dir.path());
        let run = engine.execute("report.pdf", "ops@example.com").await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step_status(StepId::PersistRemote), Some(StepStatus::Completed));
        assert_eq!(run.step_status(StepId::Notify), Some(StepStatus::Failed));
        assert_eq!(run.link.as_deref(), Some("https://drive.test/file-1"));
        assert_eq!(run.error.as_deref(), Some("Transport error: relay refused"));
    }

    #[tokio::test]
    async fn missing_local_file_after_transfer_does_not_fail_run() {
        // The fake store never reads the file, so cleanup finds nothing to delete.
        let dir = tempfile::tempdir().unwrap();

        let mut remote = MockRemoteStore::new();
        remote.expect_ensure_container().returning(|name| Ok(folder(name)));
        remote.expect_transfer_artifact().returning(|_, _, _| {
            Ok(TransferredArtifact {
                id: "file-1".to_string(),
                link: "https://drive.test/file-1".to_string(),
                container_link: None,
            })
        });
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_, recipient, _| {
            Ok(Delivery {
                recipient: recipient.to_string(),
                message_id: None,
            })
        });

        let engine = engine(remote, notifier, dir.path());
        let run = engine.execute("ghost.pdf", "ops@example.com").await;
        assert_eq!(run.status, RunStatus::Completed);
    }
}

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{metrics, workflow::WorkflowEngine, Result};

/// Names of artifacts that already went through a trigger path.
///
/// In memory only; a restart forgets everything and will re-run whatever
/// is still sitting in the upload directory.
#[derive(Clone, Default)]
pub struct SeenFiles {
    names: Arc<Mutex<HashSet<String>>>,
}

impl SeenFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.names.lock().await.contains(name)
    }

    /// Returns false if the name was already present.
    pub async fn insert(&self, name: &str) -> bool {
        self.names.lock().await.insert(name.to_string())
    }

    pub async fn remove(&self, name: &str) {
        self.names.lock().await.remove(name);
    }
}

/// Background scan path: periodically lists the upload directory and runs
/// the pipeline for every regular, non-hidden file it has not seen yet.
pub struct DirectoryScanner {
    engine: Arc<WorkflowEngine>,
    dir: PathBuf,
    interval: Duration,
    fallback_recipient: String,
    seen: SeenFiles,
}

impl DirectoryScanner {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        interval: Duration,
        fallback_recipient: impl Into<String>,
        seen: SeenFiles,
    ) -> Self {
        let dir = engine.upload_dir().to_path_buf();
        Self {
            engine,
            dir,
            interval,
            fallback_recipient: fallback_recipient.into(),
            seen,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Ticks forever. A tick that is still scanning when the next one is
    /// due causes that next tick to be skipped, never run concurrently.
    pub async fn run(self) {
        info!(
            dir = %self.dir.display(),
            interval_secs = self.interval.as_secs(),
            "Starting background directory scan"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // Skip first immediate tick

        loop {
            ticker.tick().await;
            if let Err(e) = self.scan_once().await {
                error!(error = %e, "Error in directory scan");
            }
        }
    }

    /// One scan pass. Returns the names it triggered runs for.
    pub async fn scan_once(&self) -> Result<Vec<String>> {
        if !tokio::fs::try_exists(&self.dir).await? {
            info!(dir = %self.dir.display(), "Creating upload directory");
            tokio::fs::create_dir_all(&self.dir).await?;
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "Skipping file with non UTF-8 name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => candidates.push(name),
                Ok(_) => {}
                // Removed between listing and stat, e.g. cleaned up by a finished run.
                Err(e) => debug!(file = %name, error = %e, "Skipping unreadable entry"),
            }
        }
        candidates.sort();

        let mut triggered = Vec::new();
        for name in candidates {
            if self.seen.contains(&name).await {
                continue;
            }

            info!(file = %name, "New file detected");
            metrics::SCAN_TRIGGERS_TOTAL.inc();
            let run = self.engine.execute(&name, &self.fallback_recipient).await;
            if !run.is_success() {
                warn!(
                    file = %name,
                    run_id = %run.id,
                    error = run.error.as_deref().unwrap_or("unknown"),
                    "Scan-triggered workflow failed"
                );
            }
            self.seen.insert(&name).await;
            triggered.push(name);
        }

        Ok(triggered)
    }
}

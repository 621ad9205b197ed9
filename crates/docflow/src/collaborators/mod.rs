//! External systems the workflow engine calls out to.
//!
//! The engine only sees the traits here; concrete transports live in the
//! submodules and are picked from [`crate::config::Config`] at startup.

pub mod drive;
pub mod notify;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, NotifierKind};
use crate::Result;

pub use drive::DriveStore;
pub use notify::{RelayNotifier, StdoutNotifier};

/// A remote folder that artifacts are placed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
    pub link: Option<String>,
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferredArtifact {
    pub id: String,
    pub link: String,
    pub container_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub message_id: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the same-named container under the configured parent,
    /// creating it when none exists.
    async fn ensure_container(&self, name: &str) -> Result<ContainerRef>;

    async fn transfer_artifact(
        &self,
        local_path: &Path,
        display_name: &str,
        container: &ContainerRef,
    ) -> Result<TransferredArtifact>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject_name: &str, recipient: &str, link: &str) -> Result<Delivery>;
}

pub fn remote_store_from_config(config: &Config) -> Arc<dyn RemoteStore> {
    Arc::new(DriveStore::new(&config.drive))
}

pub fn notifier_from_config(config: &Config) -> Arc<dyn Notifier> {
    match config.mail.notifier {
        NotifierKind::Stdout => Arc::new(StdoutNotifier::new(&config.mail, true)),
        NotifierKind::Relay => Arc::new(RelayNotifier::new(&config.mail)),
    }
}

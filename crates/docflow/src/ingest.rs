//! Artifact ingestion: validates an upload and stores it in the upload
//! directory under a unique name.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::workflow::SeenFiles;
use crate::{Error, Result};

const MAX_NAME_ATTEMPTS: i64 = 1000;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// An upload as received, before validation.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub recipient: Option<String>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    pub path: PathBuf,
}

pub fn validate_recipient(recipient: Option<&str>) -> Result<String> {
    let recipient = recipient
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| Error::Validation("Recipient email is required".to_string()))?;

    if !EMAIL_RE.is_match(recipient) {
        return Err(Error::Validation("Invalid email format".to_string()));
    }
    Ok(recipient.to_string())
}

/// Last path component of a client-supplied file name.
fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(Error::Validation("Invalid file name".to_string()));
    }
    Ok(base.to_string())
}

pub struct Ingestor {
    upload_dir: PathBuf,
    seen: SeenFiles,
}

impl Ingestor {
    /// Stored names are registered in `seen`, so the background scan
    /// leaves uploads to the immediate path.
    pub fn new(upload_dir: impl Into<PathBuf>, seen: SeenFiles) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            seen,
        }
    }

    /// Validates the form, then stores the file. Nothing touches disk
    /// unless validation passes.
    pub async fn ingest(&self, form: UploadForm) -> Result<(StoredArtifact, String)> {
        let file = form
            .file
            .ok_or_else(|| Error::Validation("No file uploaded".to_string()))?;
        let recipient = validate_recipient(form.recipient.as_deref())?;
        let original_name = sanitize_file_name(&file.file_name)?;

        let stored = self.store(&original_name, &file.bytes).await?;
        Ok((stored, recipient))
    }

    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<StoredArtifact> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;

        let millis = Utc::now().timestamp_millis();
        let (stored_name, path, mut file) = self.claim(millis, original_name).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        info!(file = %stored_name, size = bytes.len(), "File uploaded");

        Ok(StoredArtifact {
            stored_name,
            original_name: original_name.to_string(),
            size: bytes.len() as u64,
            path,
        })
    }

    /// Finds a free `{millis}-{name}` slot, bumping the timestamp while the
    /// candidate is taken, and creates it exclusively.
    ///
    /// The name is marked seen before the file appears so a concurrent scan
    /// skips it.
    async fn claim(&self, millis: i64, original_name: &str) -> Result<(String, PathBuf, File)> {
        for offset in 0..MAX_NAME_ATTEMPTS {
            let stored_name = format!("{}-{}", millis + offset, original_name);
            if !self.seen.insert(&stored_name).await {
                continue;
            }

            let path = self.upload_dir.join(&stored_name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((stored_name, path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    // Someone else's file; leave it to the scan.
                    self.seen.remove(&stored_name).await;
                }
                Err(e) => {
                    self.seen.remove(&stored_name).await;
                    return Err(e.into());
                }
            }
        }

        Err(Error::Internal(format!(
            "no free stored name for {} after {} attempts",
            original_name, MAX_NAME_ATTEMPTS
        )))
    }
}

//! Remote persistence against the Google Drive v3 REST API.

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ContainerRef, RemoteStore, TransferredArtifact};
use crate::config::DriveConfig;
use crate::{Error, Result};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const FILE_FIELDS: &str = "id,name,webViewLink";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Clone)]
pub struct DriveStore {
    client: reqwest::Client,
    api_base: String,
    folder_id: Option<String>,
    access_token: Option<String>,
}

impl DriveStore {
    pub fn new(config: &DriveConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            folder_id: config.folder_id.clone(),
            access_token: config.access_token.clone(),
        }
    }

    fn parent(&self) -> Result<&str> {
        self.folder_id.as_deref().ok_or_else(|| {
            Error::Config(
                "Google Drive Folder ID not configured. Please set DRIVE_FOLDER_ID.".to_string(),
            )
        })
    }

    fn token(&self) -> Result<&str> {
        self.access_token.as_deref().ok_or_else(|| {
            Error::Config(
                "Google Drive access token not configured. Please set DRIVE_ACCESS_TOKEN."
                    .to_string(),
            )
        })
    }

    async fn find_folder(
        &self,
        name: &str,
        parent: &str,
        token: &str,
    ) -> Result<Option<DriveFile>> {
        let query = format!(
            "name='{}' and '{}' in parents and mimeType='{}' and trashed=false",
            escape_query(name),
            escape_query(parent),
            FOLDER_MIME_TYPE
        );

        let response = self
            .client
            .get(format!("{}/drive/v3/files", self.api_base))
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name,webViewLink)")])
            .send()
            .await?;

        let list: FileList = check(response).await?.json().await?;
        Ok(list.files.into_iter().next())
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn ensure_container(&self, name: &str) -> Result<ContainerRef> {
        let parent = self.parent()?;
        let token = self.token()?;

        if let Some(existing) = self.find_folder(name, parent, token).await? {
            info!(folder = %name, id = %existing.id, "Folder already exists in Drive");
            return Ok(into_container(existing));
        }

        let response = self
            .client
            .post(format!("{}/drive/v3/files", self.api_base))
            .bearer_auth(token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent],
            }))
            .send()
            .await?;

        let created: DriveFile = check(response).await?.json().await?;
        info!(folder = %name, id = %created.id, "Created folder in Drive");
        Ok(into_container(created))
    }

    async fn transfer_artifact(
        &self,
        local_path: &Path,
        display_name: &str,
        container: &ContainerRef,
    ) -> Result<TransferredArtifact> {
        let token = self.token()?;
        let content = tokio::fs::read(local_path).await?;
        let mime = mime_type(display_name);

        let metadata = json!({
            "name": display_name,
            "parents": [container.id],
        });
        let boundary = format!("docflow-{}", Uuid::new_v4().simple());
        let body = related_body(&boundary, &serde_json::to_vec(&metadata)?, mime, &content);

        debug!(file = %display_name, bytes = content.len(), mime, "Uploading file to Drive");

        let response = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.api_base))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let uploaded: DriveFile = check(response).await?.json().await?;
        let link = uploaded
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", uploaded.id));

        info!(file = %uploaded.name, link = %link, "Uploaded file to Drive");

        Ok(TransferredArtifact {
            id: uploaded.id,
            link,
            container_link: container.link.clone(),
        })
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let reason = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "access denied",
        StatusCode::NOT_FOUND => "parent folder not found",
        _ => "request rejected",
    };
    Err(Error::Transport(format!(
        "Drive {} (status {}): {}",
        reason, status, body
    )))
}

fn into_container(file: DriveFile) -> ContainerRef {
    ContainerRef {
        id: file.id,
        name: file.name,
        link: file.web_view_link,
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn related_body(boundary: &str, metadata: &[u8], mime: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + content.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// MIME type from the file extension.
pub fn mime_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("txt") => "text/plain",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("zip") => "application/zip",
        Some("rar") => "application/x-rar-compressed",
        _ => "application/octet-stream",
    }
}

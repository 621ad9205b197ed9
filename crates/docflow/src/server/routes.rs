use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::AppState;
use crate::{
    ingest::{UploadForm, UploadedFile},
    metrics::gather_metrics,
    workflow::WorkflowRun,
    Error,
};

/// Body of a trigger response, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub workflow: Option<WorkflowRun>,
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match &self.0 {
            Error::Validation(message) => (StatusCode::BAD_REQUEST, message.clone(), None),
            Error::TooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message.clone(), None),
            other => {
                error!(error = %other, "Upload error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error uploading file".to_string(),
                    Some(other.to_string()),
                )
            }
        };
        let body = json!({
            "success": false,
            "message": message,
            "error": detail,
        });
        (status, Json(body)).into_response()
    }
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::TooLarge(format!("Upload too large: {}", e.body_text()))
    } else {
        Error::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "message": "Document Automation Server is running!",
        "environment": state.config.server.environment,
        "driveConfigured": state.config.drive_configured(),
        "emailConfigured": state.config.email_configured(),
    }))
}

pub async fn health() -> &'static str {
    "OK"
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, Error> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.file = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("recipientEmail") => {
                let text = field.text().await.map_err(multipart_error)?;
                form.recipient = Some(text);
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Immediate trigger path: store the upload, run the pipeline to a
/// terminal status and answer with the final run.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let (stored, recipient) = state.ingestor.ingest(form).await?;
    info!(file = %stored.stored_name, recipient = %recipient, "Triggering workflow");

    let run = state.engine.execute(&stored.stored_name, &recipient).await;

    let response = if run.is_success() {
        let body = UploadResponse {
            success: true,
            message: "File uploaded successfully! Workflow executed.".to_string(),
            filename: Some(stored.stored_name),
            original_name: Some(stored.original_name),
            size: Some(stored.size),
            recipient_email: Some(recipient),
            error: None,
            workflow: Some(run),
        };
        (StatusCode::OK, Json(body)).into_response()
    } else {
        let body = UploadResponse {
            success: false,
            message: "File uploaded but workflow failed".to_string(),
            filename: Some(stored.stored_name),
            original_name: Some(stored.original_name),
            size: Some(stored.size),
            recipient_email: Some(recipient),
            error: run.error.clone(),
            workflow: Some(run),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    };

    Ok(response)
}

pub async fn workflow_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        workflow: state.engine.state().current().await,
    })
}

pub async fn clear_workflow_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.engine.state().clear().await;
    Json(StatusResponse {
        success: true,
        workflow: None,
    })
}

pub async fn metrics() -> Response {
    match gather_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to gather metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

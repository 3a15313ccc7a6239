//! Request handlers for the analysis endpoints.
//!
//! Every handler runs exactly one orchestrator operation. Uploads are written
//! to a named temp file that is removed when the handler returns, on success
//! and failure alike.

use std::io::Write;
use std::path::Path;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scamwatch_core::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use super::AppState;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::BadRequest(_) | GatewayError::Multipart(_) => StatusCode::BAD_REQUEST,
            GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Direct reply to the caller; always carries the full envelope.
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub status: &'static str,
    pub details: Envelope,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": scamwatch_core::VERSION,
        "analyzers": state.orchestrator.availability(),
        "subscribers": state.hub.subscriber_count(),
    }))
}

pub async fn analyze_text(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Result<Json<AnalysisResponse>, GatewayError> {
    let text = request
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("No text provided".to_string()))?;

    let envelope = state.orchestrator.analyze_text(text).await;
    state.hub.broadcast(envelope.clone());

    Ok(Json(AnalysisResponse {
        status: "Text analysis triggered",
        details: envelope,
    }))
}

pub async fn analyze_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, GatewayError> {
    let upload = persist_upload(multipart).await?;

    let envelope = state.orchestrator.analyze_audio(upload.path()).await;
    drop(upload);
    state.hub.broadcast(envelope.clone());

    Ok(Json(AnalysisResponse {
        status: "Audio analysis triggered",
        details: envelope,
    }))
}

pub async fn analyze_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, GatewayError> {
    let upload = persist_upload(multipart).await?;

    let envelope = state.orchestrator.analyze_video(upload.path()).await;
    drop(upload);
    state.hub.broadcast(envelope.clone());

    Ok(Json(AnalysisResponse {
        status: "Video analysis triggered",
        details: envelope,
    }))
}

/// Single still frame in the request body. Only deepfake hits are broadcast.
pub async fn analyze_frame(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalysisResponse>, GatewayError> {
    if body.is_empty() {
        return Err(GatewayError::BadRequest("No frame provided".to_string()));
    }

    let envelope = state.orchestrator.analyze_frame_image(body.to_vec()).await;
    if envelope.is_deepfake_alert() {
        info!("deepfake face detected in submitted frame");
        state.hub.broadcast(envelope.clone());
    }

    Ok(Json(AnalysisResponse {
        status: "Frame analysis triggered",
        details: envelope,
    }))
}

/// Write the multipart `file` field to a temp file, keeping its extension.
async fn persist_upload(mut multipart: Multipart) -> Result<NamedTempFile, GatewayError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let suffix = field
            .file_name()
            .and_then(|name| Path::new(name).extension())
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let bytes = field.bytes().await?;

        debug!(bytes = bytes.len(), suffix = %suffix, "received upload");
        return write_temp(&bytes, &suffix);
    }

    Err(GatewayError::BadRequest("No file uploaded".to_string()))
}

pub(crate) fn write_temp(bytes: &[u8], suffix: &str) -> Result<NamedTempFile, GatewayError> {
    let mut file = tempfile::Builder::new()
        .prefix("scamwatch-upload-")
        .suffix(suffix)
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

//! Conversation endpoints: text chat, transcript, reset, export and reply audio

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use super::error::ApiError;
use crate::session::{Reply, SessionInfo, audio_url};
use crate::transcript::Turn;

/// File name offered for transcript downloads
pub const EXPORT_FILE_NAME: &str = "chat.json";

/// Build conversation router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcript", get(transcript))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .route("/export", get(export))
        .route("/audio/{file}", get(audio))
        .with_state(state)
}

/// Chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Result of one cycle
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub user: Turn,
    pub assistant: Turn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl From<Reply> for ChatResponse {
    fn from(reply: Reply) -> Self {
        Self {
            audio_url: reply.audio.as_ref().map(audio_url),
            user: reply.user,
            assistant: reply.assistant,
        }
    }
}

async fn transcript(State(state): State<Arc<ApiState>>) -> Json<SessionInfo> {
    Json(state.controller.info().await)
}

async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state.controller.submit_text(&request.text).await?;
    Ok(Json(reply.into()))
}

async fn reset(State(state): State<Arc<ApiState>>) -> Result<StatusCode, ApiError> {
    state.controller.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download the transcript as `chat.json`
///
/// Returns 204 when there is nothing to export.
async fn export(State(state): State<Arc<ApiState>>) -> Response {
    let Some(json) = state.controller.export().await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        json,
    )
        .into_response()
}

/// Serve the live reply artifact
async fn audio(
    State(state): State<Arc<ApiState>>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let store = state
        .controller
        .audio_store()
        .ok_or(ApiError::NotFound("audio"))?;

    let artifact = store
        .resolve(&file)
        .await
        .ok_or(ApiError::NotFound("audio"))?;

    let bytes = tokio::fs::read(&artifact.path).await.map_err(|e| {
        tracing::warn!(path = %artifact.path.display(), error = %e, "audio artifact unreadable");
        ApiError::NotFound("audio")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.mime_type),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes,
    )
        .into_response())
}

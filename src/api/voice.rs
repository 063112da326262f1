//! Voice input endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, header},
    routing::{get, post},
};
use serde::Serialize;

use super::ApiState;
use super::chat::ChatResponse;
use super::error::ApiError;

/// Largest accepted browser recording
const MAX_CLIP_BYTES: usize = 25 * 1024 * 1024;

/// MIME type assumed when the upload doesn't say
const DEFAULT_CLIP_MIME: &str = "audio/webm";

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/listen", post(listen))
        .route("/clip", post(clip).layer(DefaultBodyLimit::max(MAX_CLIP_BYTES)))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

/// Voice capabilities response
#[derive(Debug, Serialize)]
pub struct VoiceCapabilities {
    /// Server microphone capture via `/listen`
    pub server_microphone: bool,
    /// Browser uploads via `/clip`
    pub clip_upload: bool,
    /// Replies come with audio
    pub speech_output: bool,
}

async fn capabilities(State(state): State<Arc<ApiState>>) -> Json<VoiceCapabilities> {
    let recognizer = state.controller.voice_input_enabled();
    Json(VoiceCapabilities {
        server_microphone: recognizer && state.server_microphone,
        clip_upload: recognizer,
        speech_output: state.controller.audio_store().is_some(),
    })
}

/// Capture one utterance from the server's microphone and answer it
async fn listen(State(state): State<Arc<ApiState>>) -> Result<Json<ChatResponse>, ApiError> {
    if !state.server_microphone || !state.controller.voice_input_enabled() {
        return Err(ApiError::VoiceDisabled);
    }

    let reply = state.controller.listen().await?;
    Ok(Json(reply.into()))
}

/// Recognize a clip recorded in the browser and answer it
///
/// The body is the raw recording; its `Content-Type` names the encoding.
async fn clip(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    if !state.controller.voice_input_enabled() {
        return Err(ApiError::VoiceDisabled);
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("audio/") || v.starts_with("video/"))
        .unwrap_or(DEFAULT_CLIP_MIME);

    let reply = state.controller.submit_clip(&body, mime_type).await?;
    Ok(Json(reply.into()))
}

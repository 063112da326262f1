//! JSON error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::Failure;

/// Errors returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    /// A session operation failed
    Failure(Failure),
    /// Server microphone capture is turned off
    VoiceDisabled,
    NotFound(&'static str),
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        Self::Failure(failure)
    }
}

/// HTTP status for a failure kind
#[must_use]
pub const fn failure_status(failure: &Failure) -> StatusCode {
    match failure {
        Failure::EmptyInput => StatusCode::BAD_REQUEST,
        Failure::NoSpeechDetected | Failure::Unintelligible => StatusCode::UNPROCESSABLE_ENTITY,
        Failure::ServiceUnavailable(_) | Failure::SynthesisFailed(_) => StatusCode::BAD_GATEWAY,
        Failure::Busy => StatusCode::CONFLICT,
        Failure::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::Failure(failure) => (failure_status(&failure), failure.code(), failure.user_message()),
            Self::VoiceDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "voice_disabled",
                "🎤 Microphone du serveur désactivé.".to_string(),
            ),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", format!("{what} introuvable")),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

//! Session state-change notifications

use serde::Serialize;

use crate::Failure;
use crate::transcript::Turn;
use crate::voice::AudioArtifact;

/// Something the views should redraw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A turn was added at `index`
    TurnAppended { index: usize, turn: Turn },

    /// Waiting on the completion service
    Thinking,

    /// Microphone is open
    Listening,

    /// Captured audio is being recognized
    Processing,

    /// A request failed; `message` is ready to show to the user
    Error { code: &'static str, message: String },

    /// Reply audio is ready at `url`
    AudioReady { url: String, artifact: AudioArtifact },

    /// The transcript was cleared
    Cleared,

    /// The cycle finished and controls can be re-enabled
    Idle,
}

impl SessionEvent {
    #[must_use]
    pub fn error(failure: &Failure) -> Self {
        Self::Error {
            code: failure.code(),
            message: failure.user_message(),
        }
    }

    /// Event for a freshly stored artifact
    #[must_use]
    pub fn audio_ready(artifact: AudioArtifact) -> Self {
        Self::AudioReady {
            url: audio_url(&artifact),
            artifact,
        }
    }
}

/// Path the HTTP server serves `artifact` under
#[must_use]
pub fn audio_url(artifact: &AudioArtifact) -> String {
    format!("/api/audio/{}", urlencoding::encode(&artifact.file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_value(SessionEvent::Thinking).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "thinking" }));

        let json = serde_json::to_value(SessionEvent::TurnAppended {
            index: 0,
            turn: Turn::user("Bonjour"),
        })
        .unwrap();
        assert_eq!(json["type"], "turn_appended");
        assert_eq!(json["turn"]["role"], "user");
    }

    #[test]
    fn error_event_carries_user_message() {
        let json = serde_json::to_value(SessionEvent::error(&Failure::NoSpeechDetected)).unwrap();
        assert_eq!(json["code"], "no_speech_detected");
        assert_eq!(json["message"], "⏰ Aucun son détecté.");
    }
}

//! Error types for the voice assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Internal errors raised by clients, devices and configuration
///
/// Adapters convert these into a [`Failure`] before they reach the session
/// controller or the UI.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Completion service error
    #[error("completion error: {0}")]
    Completion(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// User-facing outcome of a failed interaction
///
/// Every adapter call returns one of these instead of propagating a raw
/// error, so callers handle each case explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    /// Input was empty or whitespace only; nothing was sent
    #[error("empty input")]
    EmptyInput,

    /// The microphone heard nothing before the listen timeout
    #[error("no speech detected")]
    NoSpeechDetected,

    /// Speech was captured but could not be understood
    #[error("speech could not be understood")]
    Unintelligible,

    /// A remote service (recognition, completion) failed or was unreachable
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Speech synthesis failed; the text reply is still valid
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Another request is already in flight for this session
    #[error("a request is already in progress")]
    Busy,

    /// Anything else (device errors, worker panics)
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl Failure {
    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::NoSpeechDetected => "no_speech_detected",
            Self::Unintelligible => "unintelligible",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::SynthesisFailed(_) => "synthesis_failed",
            Self::Busy => "busy",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Message shown to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyInput => "Veuillez saisir un message.".to_string(),
            Self::NoSpeechDetected => "⏰ Aucun son détecté.".to_string(),
            Self::Unintelligible => "❓ Impossible de comprendre l'audio.".to_string(),
            Self::ServiceUnavailable(_) => {
                "🌐 Service indisponible, réessayez plus tard.".to_string()
            }
            Self::SynthesisFailed(_) => "🔇 Synthèse vocale indisponible.".to_string(),
            Self::Busy => "⏳ Une requête est déjà en cours.".to_string(),
            Self::Unknown(detail) => format!("⚠️ Erreur : {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_has_a_distinct_message() {
        let failures = [
            Failure::EmptyInput,
            Failure::NoSpeechDetected,
            Failure::Unintelligible,
            Failure::ServiceUnavailable("down".to_string()),
            Failure::SynthesisFailed("tts".to_string()),
            Failure::Busy,
            Failure::Unknown("boom".to_string()),
        ];

        let mut messages: Vec<String> = failures.iter().map(Failure::user_message).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), failures.len());

        let mut codes: Vec<&str> = failures.iter().map(Failure::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), failures.len());
    }

    #[test]
    fn unknown_carries_detail() {
        let failure = Failure::Unknown("device unplugged".to_string());
        assert!(failure.user_message().contains("device unplugged"));
    }
}

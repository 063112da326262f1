//! TOML configuration file loading
//!
//! Supports `~/.config/vocal-assistant/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Completion (LLM) configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Directory for synthesized audio artifacts
    pub audio_dir: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// API key for the completion service
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL (e.g. `https://api.groq.com/openai/v1`)
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama-3.1-8b-instant")
    pub model: Option<String>,

    /// System instruction sent with every request
    pub system_prompt: Option<String>,

    /// "latest" or "full"
    pub context: Option<String>,

    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable server-side microphone capture
    pub enabled: Option<bool>,

    /// Synthesis language (e.g. "fr")
    pub language: Option<String>,

    /// Recognition language tag (e.g. "fr-FR")
    pub recognition_language: Option<String>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,
    pub stt_model: Option<String>,
    pub stt_base_url: Option<String>,
    pub stt_api_key: Option<String>,

    /// TTS provider ("google" or "openai")
    pub tts_provider: Option<String>,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_speed: Option<f32>,
    pub tts_base_url: Option<String>,
    pub tts_api_key: Option<String>,

    /// Ambient noise calibration window in seconds
    pub ambient_duration: Option<f32>,

    /// Seconds to wait for speech to start
    pub listen_timeout: Option<f32>,

    /// Maximum phrase length in seconds
    pub phrase_time_limit: Option<f32>,

    /// Seconds of silence that end a phrase
    pub pause_threshold: Option<f32>,

    /// Minimum RMS energy counted as speech (0.0 to 1.0)
    pub energy_threshold: Option<f32>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP port
    pub port: Option<u16>,

    /// Directory containing a custom `index.html`
    pub static_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/vocal-assistant/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vocal-assistant").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [llm]
            model = "llama-3.3-70b-versatile"
            context = "full"

            [voice]
            tts_provider = "openai"
            listen_timeout = 8.0
            "#,
        )
        .unwrap();

        assert_eq!(fc.llm.model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert_eq!(fc.llm.context.as_deref(), Some("full"));
        assert_eq!(fc.voice.tts_provider.as_deref(), Some("openai"));
        assert_eq!(fc.voice.listen_timeout, Some(8.0));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn empty_file_is_default() {
        let fc: ConfigFile = toml::from_str("").unwrap();
        assert!(fc.llm.api_key.is_none());
        assert!(fc.audio_dir.is_none());
    }

    #[test]
    fn read_reports_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();

        assert!(matches!(read_config_file(&path), Err(crate::Error::Toml(_))));
    }
}

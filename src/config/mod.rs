//! Configuration management for the voice assistant
//!
//! Values resolve with priority env > TOML file > default. The completion
//! credential has no default: without it the assistant refuses to start.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::voice::ListenSettings;
use crate::{Error, Result};

pub use file::{ConfigFile, config_file_path, load_config_file};

/// Default OpenAI-compatible completion endpoint (Groq)
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default completion model
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Default system instruction
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8501;

/// Environment variable holding the completion credential
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion service configuration
    pub completion: CompletionConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Directory where synthesized replies are written
    pub audio_dir: PathBuf,
}

/// Which turns are sent as context with each completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMode {
    /// Only the current user message
    #[default]
    Latest,
    /// Every prior turn of the session, then the current user message
    Full,
}

impl ContextMode {
    /// Parse a context mode name, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "latest" => Some(Self::Latest),
            "full" | "history" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Completion service configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Bearer credential
    pub api_key: SecretString,

    /// OpenAI-compatible base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Fixed system instruction
    pub system_prompt: String,

    pub context_mode: ContextMode,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    /// OpenAI-compatible `/audio/transcriptions` (Groq, `OpenAI`)
    #[default]
    Whisper,
    Deepgram,
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    /// Google Translate speech endpoint (no key required)
    #[default]
    Google,
    /// OpenAI-compatible `/audio/speech`
    OpenAi,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub provider: SttProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: SecretString,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    pub model: String,
    pub voice: String,
    pub speed: f32,
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable server-side microphone capture
    pub enabled: bool,

    /// Synthesis language (e.g. "fr")
    pub language: String,

    /// Recognition language tag (e.g. "fr-FR")
    pub recognition_language: String,

    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub listen: ListenSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Directory containing a custom `index.html` for the web UI
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if the completion API key is missing
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if the completion API key is missing
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = load_config_file();
        let config = Self::from_sources(fc, &|key| std::env::var(key).ok(), disable_voice)?;

        if disable_voice {
            tracing::info!("voice capture explicitly disabled via --disable-voice");
        }

        Ok(config)
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the completion API key is missing or empty
    pub fn from_sources(
        fc: ConfigFile,
        env: &dyn Fn(&str) -> Option<String>,
        disable_voice: bool,
    ) -> Result<Self> {
        let api_key = env(API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .or_else(|| fc.llm.api_key.filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "{API_KEY_ENV} is not set (export it or add `api_key` under [llm] in the config file)"
                ))
            })?;

        let context_mode = env("VOCAL_CONTEXT")
            .or(fc.llm.context)
            .map_or(Ok(ContextMode::default()), |raw| {
                ContextMode::parse(&raw)
                    .ok_or_else(|| Error::Config(format!("unknown context mode: {raw}")))
            })?;

        let base_url = env("VOCAL_LLM_BASE_URL")
            .or(fc.llm.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let completion = CompletionConfig {
            api_key: SecretString::from(api_key.clone()),
            base_url: base_url.clone(),
            model: env("VOCAL_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: fc
                .llm
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            context_mode,
            max_tokens: fc.llm.max_tokens,
            temperature: fc.llm.temperature,
            timeout: Duration::from_secs(fc.llm.timeout_secs.unwrap_or(60)),
        };

        let vf = fc.voice;

        let stt_provider = match vf.stt_provider.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("whisper" | "groq" | "openai") => SttProvider::Whisper,
            Some("deepgram") => SttProvider::Deepgram,
            Some(other) => return Err(Error::Config(format!("unknown STT provider: {other}"))),
        };

        // Whisper defaults to the completion endpoint and key (Groq hosts both)
        let stt = SttConfig {
            provider: stt_provider,
            model: env("VOCAL_STT_MODEL").or(vf.stt_model).unwrap_or_else(|| {
                match stt_provider {
                    SttProvider::Whisper => "whisper-large-v3".to_string(),
                    SttProvider::Deepgram => "nova-2".to_string(),
                }
            }),
            base_url: vf.stt_base_url.unwrap_or_else(|| base_url.clone()),
            api_key: SecretString::from(
                env("VOCAL_STT_API_KEY")
                    .or(vf.stt_api_key)
                    .unwrap_or_else(|| api_key.clone()),
            ),
        };

        let tts_provider = match vf.tts_provider.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("google" | "gtts") => TtsProvider::Google,
            Some("openai") => TtsProvider::OpenAi,
            Some(other) => return Err(Error::Config(format!("unknown TTS provider: {other}"))),
        };

        let tts = TtsConfig {
            provider: tts_provider,
            model: vf.tts_model.unwrap_or_else(|| "tts-1".to_string()),
            voice: vf.tts_voice.unwrap_or_else(|| "alloy".to_string()),
            speed: vf.tts_speed.unwrap_or(1.0),
            base_url: vf
                .tts_base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: env("VOCAL_TTS_API_KEY")
                .or(vf.tts_api_key)
                .map(SecretString::from),
        };

        let defaults = ListenSettings::default();
        let listen = ListenSettings {
            ambient_duration: secs_or(vf.ambient_duration, defaults.ambient_duration),
            timeout: secs_or(vf.listen_timeout, defaults.timeout),
            phrase_time_limit: secs_or(vf.phrase_time_limit, defaults.phrase_time_limit),
            pause_threshold: secs_or(vf.pause_threshold, defaults.pause_threshold),
            energy_threshold: vf.energy_threshold.unwrap_or(defaults.energy_threshold),
            ..defaults
        };

        let voice = VoiceConfig {
            enabled: !disable_voice && vf.enabled.unwrap_or(true),
            language: env("VOCAL_LANGUAGE")
                .or(vf.language)
                .unwrap_or_else(|| "fr".to_string()),
            recognition_language: vf
                .recognition_language
                .unwrap_or_else(|| "fr-FR".to_string()),
            stt,
            tts,
            listen,
        };

        let server = ServerConfig {
            port: env("VOCAL_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            static_dir: env("VOCAL_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        // Audio artifacts live in the cache dir (~/.cache/vocal-assistant/audio on Linux)
        let audio_dir = env("VOCAL_AUDIO_DIR")
            .or(fc.audio_dir)
            .map_or_else(default_audio_dir, PathBuf::from);

        Ok(Self {
            completion,
            voice,
            server,
            audio_dir,
        })
    }
}

fn secs_or(value: Option<f32>, default: Duration) -> Duration {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map_or(default, Duration::from_secs_f32)
}

fn default_audio_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".cache/vocal-assistant/audio"),
        |d| d.cache_dir().join("vocal-assistant").join("audio"),
    )
}

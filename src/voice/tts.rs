//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{TtsConfig, TtsProvider};
use crate::{Error, Result};

/// Longest text Google's speech endpoint accepts per request
const GOOGLE_MAX_CHARS: usize = 100;

/// Google Translate speech endpoint
const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Turns text into encoded audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `language`
    ///
    /// Returns MP3 bytes.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    voice: String,
    speed: f32,
    model: String,
    base_url: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a TTS client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider needs an API key and none is configured
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        if config.provider == TtsProvider::OpenAi
            && config
                .api_key
                .as_ref()
                .is_none_or(|k| k.expose_secret().is_empty())
        {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            voice: config.voice.clone(),
            speed: config.speed,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            provider: config.provider,
        })
    }

    /// Synthesize using Google Translate speech
    ///
    /// Long text is split into chunks and the MP3 segments are concatenated.
    async fn synthesize_google(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let chunks = chunk_text(text, GOOGLE_MAX_CHARS);
        if chunks.is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        let total = chunks.len();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let total_param = total.to_string();
            let idx_param = idx.to_string();
            let len_param = chunk.chars().count().to_string();

            let response = self
                .client
                .get(GOOGLE_TTS_URL)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", language),
                    ("q", chunk.as_str()),
                    ("total", total_param.as_str()),
                    ("idx", idx_param.as_str()),
                    ("textlen", len_param.as_str()),
                ])
                .header("User-Agent", "Mozilla/5.0")
                .header("Referer", "https://translate.google.com/")
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
            }

            let bytes = response.bytes().await?;
            tracing::trace!(idx, total, bytes = bytes.len(), "synthesized chunk");
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }

    /// Synthesize using an OpenAI-compatible speech endpoint
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("OpenAI API key required for TTS".to_string()))?;

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        tracing::debug!(provider = self.name(), chars = text.len(), language, "synthesizing speech");

        let audio = match self.provider {
            TtsProvider::Google => self.synthesize_google(text, language).await?,
            TtsProvider::OpenAi => self.synthesize_openai(text).await?,
        };

        if audio.is_empty() {
            return Err(Error::Tts("service returned no audio".to_string()));
        }

        Ok(audio)
    }

    fn name(&self) -> &'static str {
        match self.provider {
            TtsProvider::Google => "google",
            TtsProvider::OpenAi => "openai",
        }
    }
}

/// Split text into pieces of at most `max_chars` characters
///
/// Breaks on whitespace where possible; a single word longer than the limit
/// is split mid-word.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("Bonjour tout le monde", 100), ["Bonjour tout le monde"]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("   \n ", 100).is_empty());
    }

    #[test]
    fn chunks_respect_limit_and_keep_words() {
        let text = "Le renard brun rapide saute par-dessus le chien paresseux. ".repeat(6);
        let chunks = chunk_text(&text, 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {chunk}");
        }
        assert_eq!(chunks.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn long_word_is_split() {
        let word = "a".repeat(250);
        let chunks = chunk_text(&format!("début {word} fin"), 100);
        let a100 = "a".repeat(100);
        let a50 = "a".repeat(50);
        assert_eq!(chunks, ["début", a100.as_str(), a100.as_str(), a50.as_str(), "fin"]);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let text = "é".repeat(100);
        assert_eq!(chunk_text(&text, 100).len(), 1);
    }

    #[test]
    fn openai_provider_requires_key() {
        let config = TtsConfig {
            provider: TtsProvider::OpenAi,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        };
        assert!(TextToSpeech::from_config(&config).is_err());

        let google = TtsConfig {
            provider: TtsProvider::Google,
            ..config
        };
        assert!(TextToSpeech::from_config(&google).is_ok());
    }
}

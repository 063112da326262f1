//! Speech output: reply text to a playable audio artifact

use std::sync::Arc;

use super::artifact::{AudioArtifact, AudioStore};
use super::tts::SpeechSynthesizer;
use crate::Failure;

/// Synthesizes replies and stores them for playback
pub struct SpeechOutput {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<AudioStore>,
    language: String,
}

impl SpeechOutput {
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<AudioStore>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            store,
            language: language.into(),
        }
    }

    /// Store backing this output
    #[must_use]
    pub fn store(&self) -> &Arc<AudioStore> {
        &self.store
    }

    /// Speak `text` into a new artifact
    ///
    /// # Errors
    ///
    /// Returns `Failure::SynthesisFailed` if the service or the disk write fails
    pub async fn synthesize(&self, text: &str) -> Result<AudioArtifact, Failure> {
        let audio = self
            .synthesizer
            .synthesize(text, &self.language)
            .await
            .map_err(|e| {
                tracing::warn!(provider = self.synthesizer.name(), error = %e, "speech synthesis failed");
                Failure::SynthesisFailed(e.to_string())
            })?;

        self.store.save(&audio).await.map_err(|e| {
            tracing::warn!(error = %e, "failed to store synthesized audio");
            Failure::SynthesisFailed(e.to_string())
        })
    }
}

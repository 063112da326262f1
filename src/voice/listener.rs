//! Speech input: one bounded listening window to recognized text
//!
//! Capture runs on a blocking worker because audio streams are tied to the
//! thread that opened them. Recognition happens back on the async runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::capture::{AudioCapture, AudioSource, samples_to_wav};
use super::detector::{DetectorState, ListenSettings, UtteranceDetector};
use super::stt::SpeechRecognizer;
use crate::{Error, Failure, Result};

/// Delay between microphone buffer reads
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Extra wall-clock allowance before a stalled device is abandoned
const STALL_GRACE: Duration = Duration::from_secs(2);

/// Progress notifications emitted while capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenPhase {
    /// Microphone open, waiting for the user to speak
    Listening,
    /// Audio captured, recognition in progress
    Processing,
}

/// Callback receiving listen progress
pub type PhaseCallback = Arc<dyn Fn(ListenPhase) + Send + Sync>;

/// Opens a fresh audio source on the capture thread
pub type SourceFactory = Arc<dyn Fn() -> Result<Box<dyn AudioSource>> + Send + Sync>;

/// Captures an utterance from the microphone and recognizes it
pub struct SpeechInput {
    recognizer: Arc<dyn SpeechRecognizer>,
    source_factory: SourceFactory,
    settings: ListenSettings,
    language: String,
    poll_interval: Duration,
}

impl SpeechInput {
    /// Speech input over the default microphone
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        settings: ListenSettings,
        language: impl Into<String>,
    ) -> Self {
        let factory: SourceFactory = Arc::new(|| -> Result<Box<dyn AudioSource>> {
            Ok(Box::new(AudioCapture::new()?))
        });
        Self::with_source(recognizer, factory, settings, language)
    }

    /// Speech input over a custom audio source
    #[must_use]
    pub fn with_source(
        recognizer: Arc<dyn SpeechRecognizer>,
        source_factory: SourceFactory,
        settings: ListenSettings,
        language: impl Into<String>,
    ) -> Self {
        Self {
            recognizer,
            source_factory,
            settings,
            language: language.into(),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the delay between source reads
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Listen for one utterance and return its text
    ///
    /// # Errors
    ///
    /// - `NoSpeechDetected` if nobody spoke before the timeout
    /// - `Unintelligible` if the recognizer found no words
    /// - `ServiceUnavailable` if the recognition service failed
    /// - `Unknown` for device or encoding errors
    pub async fn capture_utterance(&self, on_phase: PhaseCallback) -> std::result::Result<String, Failure> {
        let factory = Arc::clone(&self.source_factory);
        let settings = self.settings;
        let poll_interval = self.poll_interval;
        let notify = Arc::clone(&on_phase);

        let (samples, sample_rate) = tokio::task::spawn_blocking(move || {
            let mut source = factory().map_err(|e| Failure::Unknown(e.to_string()))?;
            let outcome = record_phrase(source.as_mut(), settings, poll_interval, notify.as_ref());
            source.stop();
            outcome.map(|samples| (samples, source.sample_rate()))
        })
        .await
        .map_err(|e| Failure::Unknown(format!("capture worker failed: {e}")))??;

        on_phase(ListenPhase::Processing);

        let wav = samples_to_wav(&samples, sample_rate).map_err(|e| Failure::Unknown(e.to_string()))?;
        self.recognize(&wav, "audio/wav").await
    }

    /// Recognize an already recorded clip (e.g. uploaded by the browser)
    ///
    /// # Errors
    ///
    /// Same classification as [`Self::capture_utterance`], minus the timeout
    pub async fn recognize_clip(&self, audio: &[u8], mime_type: &str) -> std::result::Result<String, Failure> {
        if audio.is_empty() {
            return Err(Failure::NoSpeechDetected);
        }
        self.recognize(audio, mime_type).await
    }

    async fn recognize(&self, audio: &[u8], mime_type: &str) -> std::result::Result<String, Failure> {
        let result = self
            .recognizer
            .recognize(audio, mime_type, &self.language)
            .await;

        classify_recognition(result)
    }
}

/// Map a recognizer result onto the failure taxonomy
///
/// # Errors
///
/// Returns the failure matching the recognizer's outcome
pub fn classify_recognition(result: Result<String>) -> std::result::Result<String, Failure> {
    match result {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                Err(Failure::Unintelligible)
            } else {
                Ok(text.to_string())
            }
        }
        Err(e @ (Error::Http(_) | Error::Stt(_))) => {
            tracing::warn!(error = %e, "recognition service failed");
            Err(Failure::ServiceUnavailable(e.to_string()))
        }
        Err(e) => {
            tracing::warn!(error = %e, "recognition failed");
            Err(Failure::Unknown(e.to_string()))
        }
    }
}

/// Record from `source` until one phrase is complete
///
/// Blocks the calling thread. Timing follows consumed samples; the wall
/// clock only guards against a device that stops delivering audio.
fn record_phrase(
    source: &mut dyn AudioSource,
    settings: ListenSettings,
    poll_interval: Duration,
    notify: &(dyn Fn(ListenPhase) + Send + Sync),
) -> std::result::Result<Vec<f32>, Failure> {
    source.start().map_err(|e| Failure::Unknown(e.to_string()))?;
    notify(ListenPhase::Listening);

    let mut detector = UtteranceDetector::new(settings, source.sample_rate());
    let deadline = Instant::now()
        + settings.ambient_duration
        + settings.timeout
        + settings.phrase_time_limit
        + STALL_GRACE;

    loop {
        let chunk = source.read().map_err(|e| Failure::Unknown(e.to_string()))?;

        if !chunk.is_empty() {
            match detector.process(&chunk) {
                DetectorState::Complete => return Ok(detector.take_phrase()),
                DetectorState::TimedOut => return Err(Failure::NoSpeechDetected),
                DetectorState::Calibrating
                | DetectorState::WaitingForSpeech
                | DetectorState::Speaking => {}
            }
        }

        if Instant::now() >= deadline {
            tracing::warn!(state = ?detector.state(), "audio source stalled, ending capture");
            return match detector.state() {
                DetectorState::Speaking => Ok(detector.take_phrase()),
                _ => Err(Failure::NoSpeechDetected),
            };
        }

        if chunk.is_empty() && !poll_interval.is_zero() {
            std::thread::sleep(poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct FixedRecognizer(fn() -> Result<String>);

    #[async_trait]
    impl SpeechRecognizer for FixedRecognizer {
        async fn recognize(&self, _audio: &[u8], _mime: &str, _language: &str) -> Result<String> {
            (self.0)()
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Plays back chunks, then silence forever
    struct ScriptedSource {
        chunks: std::collections::VecDeque<Vec<f32>>,
    }

    impl AudioSource for ScriptedSource {
        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        fn read(&mut self) -> Result<Vec<f32>> {
            Ok(self.chunks.pop_front().unwrap_or_else(|| vec![0.0; 1600]))
        }

        fn stop(&mut self) {}

        fn sample_rate(&self) -> u32 {
            16000
        }
    }

    fn scripted(chunks: Vec<Vec<f32>>) -> SourceFactory {
        let chunks = Arc::new(Mutex::new(Some(chunks)));
        Arc::new(move || -> Result<Box<dyn AudioSource>> {
            let chunks = chunks.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(ScriptedSource {
                chunks: chunks.into(),
            }) as Box<dyn AudioSource>)
        })
    }

    /// Half a second of quiet room for calibration, then loud speech
    fn speech(seconds: usize) -> Vec<Vec<f32>> {
        let quiet = (0..5).map(|_| vec![0.0; 1600]);
        quiet.chain((0..seconds * 10).map(|_| vec![0.3; 1600])).collect()
    }

    fn input(recognizer: fn() -> Result<String>, chunks: Vec<Vec<f32>>) -> SpeechInput {
        SpeechInput::with_source(
            Arc::new(FixedRecognizer(recognizer)),
            scripted(chunks),
            ListenSettings::default(),
            "fr-FR",
        )
        .poll_interval(Duration::ZERO)
    }

    fn recording_phases() -> (PhaseCallback, Arc<Mutex<Vec<ListenPhase>>>) {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let callback: PhaseCallback = Arc::new(move |phase: ListenPhase| sink.lock().unwrap().push(phase));
        (callback, phases)
    }

    #[tokio::test]
    async fn silence_times_out() {
        let input = input(|| Ok("never".to_string()), Vec::new());
        let (callback, phases) = recording_phases();

        let result = input.capture_utterance(callback).await;

        assert_eq!(result, Err(Failure::NoSpeechDetected));
        assert_eq!(*phases.lock().unwrap(), [ListenPhase::Listening]);
    }

    #[tokio::test]
    async fn speech_is_recognized() {
        let input = input(|| Ok("  Bonjour  ".to_string()), speech(1));
        let (callback, phases) = recording_phases();

        let result = input.capture_utterance(callback).await;

        assert_eq!(result.as_deref(), Ok("Bonjour"));
        assert_eq!(
            *phases.lock().unwrap(),
            [ListenPhase::Listening, ListenPhase::Processing]
        );
    }

    #[tokio::test]
    async fn blank_transcript_is_unintelligible() {
        let input = input(|| Ok("   ".to_string()), speech(1));
        let (callback, _) = recording_phases();

        assert_eq!(input.capture_utterance(callback).await, Err(Failure::Unintelligible));
    }

    #[tokio::test]
    async fn service_error_is_unavailable() {
        let input = input(|| Err(Error::Stt("503".to_string())), speech(1));
        let (callback, _) = recording_phases();

        assert!(matches!(
            input.capture_utterance(callback).await,
            Err(Failure::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn device_error_is_unknown() {
        let factory: SourceFactory = Arc::new(|| -> Result<Box<dyn AudioSource>> {
            Err(Error::Audio("no input device".to_string()))
        });
        let input = SpeechInput::with_source(
            Arc::new(FixedRecognizer(|| Ok("x".to_string()))),
            factory,
            ListenSettings::default(),
            "fr-FR",
        );
        let (callback, phases) = recording_phases();

        assert!(matches!(
            input.capture_utterance(callback).await,
            Err(Failure::Unknown(msg)) if msg.contains("no input device")
        ));
        assert!(phases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_clip_is_no_speech() {
        let input = input(|| Ok("x".to_string()), Vec::new());
        assert_eq!(input.recognize_clip(&[], "audio/webm").await, Err(Failure::NoSpeechDetected));
    }

    #[test]
    fn classification_covers_every_outcome() {
        assert_eq!(classify_recognition(Ok("oui".to_string())), Ok("oui".to_string()));
        assert_eq!(classify_recognition(Ok(String::new())), Err(Failure::Unintelligible));
        assert!(matches!(
            classify_recognition(Err(Error::Stt("x".to_string()))),
            Err(Failure::ServiceUnavailable(_))
        ));
        assert!(matches!(
            classify_recognition(Err(Error::Audio("x".to_string()))),
            Err(Failure::Unknown(_))
        ));
    }
}

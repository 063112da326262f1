//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vocal_assistant::voice::{
    AudioSource, AudioStore, ListenSettings, SourceFactory, SpeechInput, SpeechOutput,
    SpeechRecognizer, SpeechSynthesizer,
};
use vocal_assistant::{CompletionProvider, Error, Result, SessionController, Turn};

/// Reply used by [`MockCompletion::default`]
pub const ASSISTANT_REPLY: &str = "Bonjour ! Comment puis-je vous aider ?";

/// Bytes returned by [`MockSynthesizer`]
pub const FAKE_MP3: &[u8] = b"ID3\x04fake-mp3-frames";

/// A recorded completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCall {
    pub history: Vec<Turn>,
    pub user_text: String,
}

/// Completion provider with a canned reply
pub struct MockCompletion {
    reply: Option<String>,
    delay: Duration,
    calls: Mutex<Vec<CompletionCall>>,
}

impl MockCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every request fails as if the service were down
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Replies after `delay`, to keep a cycle in flight
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(ASSISTANT_REPLY.to_string()),
            delay,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self {
            reply: Some(ASSISTANT_REPLY.to_string()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    async fn complete(&self, history: &[Turn], user_text: &str) -> Result<String> {
        self.calls.lock().unwrap().push(CompletionCall {
            history: history.to_vec(),
            user_text: user_text.to_string(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.reply
            .clone()
            .ok_or_else(|| Error::Completion("API error 503 Service Unavailable".to_string()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Synthesizer returning fixed bytes, failing once its successes run out
pub struct MockSynthesizer {
    successes: usize,
    calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn working() -> Arc<Self> {
        Self::failing_after(usize::MAX)
    }

    pub fn failing() -> Arc<Self> {
        Self::failing_after(0)
    }

    /// Succeeds `successes` times, then every call fails
    pub fn failing_after(successes: usize) -> Arc<Self> {
        Arc::new(Self {
            successes,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.successes {
            return Err(Error::Tts("quota exceeded".to_string()));
        }
        Ok(FAKE_MP3.to_vec())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Recognizer that always hears the same text
pub struct MockRecognizer {
    text: String,
}

impl MockRecognizer {
    pub fn hearing(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn recognize(&self, _audio: &[u8], _mime_type: &str, _language: &str) -> Result<String> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Audio source playing back chunks, then silence forever
pub struct ScriptedSource {
    chunks: VecDeque<Vec<f32>>,
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

/// Factory whose sources play `chunks` (each new source starts over)
pub fn scripted_source(chunks: Vec<Vec<f32>>) -> SourceFactory {
    Arc::new(move || -> Result<Box<dyn AudioSource>> {
        Ok(Box::new(ScriptedSource {
            chunks: chunks.clone().into(),
        }))
    })
}

/// A microphone that only ever hears silence
pub fn silent_microphone() -> SourceFactory {
    scripted_source(Vec::new())
}

/// A microphone in a quiet room that hears one second of loud speech
pub fn speaking_microphone() -> SourceFactory {
    let quiet = (0..5).map(|_| vec![0.0; 1600]);
    let speech = (0..10).map(|_| vec![0.3; 1600]);
    scripted_source(quiet.chain(speech).collect())
}

/// Microphone hearing silence in real time that counts open sources
#[derive(Clone, Default)]
pub struct TrackedMicrophone {
    opened: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl TrackedMicrophone {
    pub fn factory(&self) -> SourceFactory {
        let microphone = self.clone();
        Arc::new(move || -> Result<Box<dyn AudioSource>> {
            microphone.opened.fetch_add(1, Ordering::SeqCst);
            let now = microphone.open.fetch_add(1, Ordering::SeqCst) + 1;
            microphone.peak.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(TrackedSource {
                open: Arc::clone(&microphone.open),
            }))
        })
    }

    /// Sources opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Most sources ever open at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct TrackedSource {
    open: Arc<AtomicUsize>,
}

impl AudioSource for TrackedSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<f32>> {
        // 100ms of audio every 10ms of wall time
        std::thread::sleep(Duration::from_millis(10));
        Ok(vec![0.0; 1600])
    }

    fn stop(&mut self) {}

    fn sample_rate(&self) -> u32 {
        16000
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Speech input over a scripted microphone
pub fn speech_input(recognizer: Arc<MockRecognizer>, microphone: SourceFactory) -> SpeechInput {
    SpeechInput::with_source(recognizer, microphone, ListenSettings::default(), "fr-FR")
        .poll_interval(Duration::ZERO)
}

/// Speech output writing into `dir`
pub fn speech_output(synthesizer: Arc<MockSynthesizer>, dir: &std::path::Path) -> SpeechOutput {
    SpeechOutput::new(synthesizer, Arc::new(AudioStore::new(dir)), "fr")
}

/// Controller with a mock completion and no voice
pub fn text_controller(completion: Arc<MockCompletion>) -> SessionController {
    SessionController::builder(completion).build()
}

//! Request/response cycle orchestration

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast};

use super::events::SessionEvent;
use super::{Session, SessionInfo};
use crate::Failure;
use crate::completion::{CompletionProvider, classify_completion};
use crate::config::ContextMode;
use crate::transcript::Turn;
use crate::voice::{AudioArtifact, AudioStore, ListenPhase, PhaseCallback, SpeechInput, SpeechOutput};

/// Capacity of the event channel; slow subscribers skip old events
const EVENT_CAPACITY: usize = 64;

/// Outcome of one successful cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub user: Turn,
    pub assistant: Turn,
    /// Synthesized reply, absent if voice output is off or synthesis failed
    pub audio: Option<AudioArtifact>,
}

/// Builder for [`SessionController`]
pub struct SessionControllerBuilder {
    completion: Arc<dyn CompletionProvider>,
    speech_input: Option<SpeechInput>,
    speech_output: Option<SpeechOutput>,
    context_mode: ContextMode,
}

impl SessionControllerBuilder {
    #[must_use]
    pub fn speech_input(mut self, input: SpeechInput) -> Self {
        self.speech_input = Some(input);
        self
    }

    #[must_use]
    pub fn speech_output(mut self, output: SpeechOutput) -> Self {
        self.speech_output = Some(output);
        self
    }

    #[must_use]
    pub fn context_mode(mut self, mode: ContextMode) -> Self {
        self.context_mode = mode;
        self
    }

    #[must_use]
    pub fn build(self) -> SessionController {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        SessionController {
            shared: Arc::new(Shared {
                session: RwLock::new(Session::new()),
                completion: self.completion,
                speech_input: self.speech_input,
                speech_output: self.speech_output,
                context_mode: self.context_mode,
                events,
            }),
            cycle: Arc::new(Mutex::new(())),
        }
    }
}

/// Drives the session: input, completion, transcript, synthesis
///
/// Only one cycle runs at a time. A trigger arriving while another is in
/// flight fails with [`Failure::Busy`] instead of queueing. Each cycle runs
/// on its own task that owns the busy guard, so dropping the caller's future
/// (a disconnected HTTP client) never frees the guard before the microphone
/// is closed and the cycle has reported its outcome.
pub struct SessionController {
    shared: Arc<Shared>,
    cycle: Arc<Mutex<()>>,
}

/// State reachable from a running cycle task
struct Shared {
    session: RwLock<Session>,
    completion: Arc<dyn CompletionProvider>,
    speech_input: Option<SpeechInput>,
    speech_output: Option<SpeechOutput>,
    context_mode: ContextMode,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    /// Start building a controller around a completion provider
    #[must_use]
    pub fn builder(completion: Arc<dyn CompletionProvider>) -> SessionControllerBuilder {
        SessionControllerBuilder {
            completion,
            speech_input: None,
            speech_output: None,
            context_mode: ContextMode::default(),
        }
    }

    /// Receive state-change notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Whether microphone capture is available
    #[must_use]
    pub fn voice_input_enabled(&self) -> bool {
        self.shared.speech_input.is_some()
    }

    /// Store holding the latest synthesized reply
    #[must_use]
    pub fn audio_store(&self) -> Option<&Arc<AudioStore>> {
        self.shared.audio_store()
    }

    /// Handle typed input
    ///
    /// # Errors
    ///
    /// - `EmptyInput` for blank text; nothing is appended
    /// - `Busy` if another cycle is running
    /// - `ServiceUnavailable` / `Unknown` if the completion fails; the user
    ///   turn stays in the transcript
    pub async fn submit_text(&self, text: &str) -> Result<Reply, Failure> {
        if text.trim().is_empty() {
            return Err(Failure::EmptyInput);
        }

        let text = text.to_string();
        self.spawn_cycle(|shared| async move { shared.run_cycle(&text).await })
            .await
    }

    /// Capture one utterance from the server microphone and answer it
    ///
    /// # Errors
    ///
    /// Capture failures (`NoSpeechDetected`, `Unintelligible`,
    /// `ServiceUnavailable`) leave the transcript untouched. Completion
    /// failures behave as in [`Self::submit_text`].
    pub async fn listen(&self) -> Result<Reply, Failure> {
        self.spawn_cycle(|shared| async move {
            let input = shared.speech_input()?;

            let events = shared.events.clone();
            let on_phase: PhaseCallback = Arc::new(move |phase: ListenPhase| {
                let event = match phase {
                    ListenPhase::Listening => SessionEvent::Listening,
                    ListenPhase::Processing => SessionEvent::Processing,
                };
                events.send(event).ok();
            });

            tracing::info!("listening for speech");
            let text = input.capture_utterance(on_phase).await;
            let text = shared.recognized(text)?;

            shared.run_cycle(&text).await
        })
        .await
    }

    /// Recognize a clip recorded by the browser and answer it
    ///
    /// # Errors
    ///
    /// Same as [`Self::listen`]
    pub async fn submit_clip(&self, audio: &[u8], mime_type: &str) -> Result<Reply, Failure> {
        let audio = audio.to_vec();
        let mime_type = mime_type.to_string();

        self.spawn_cycle(|shared| async move {
            let input = shared.speech_input()?;

            tracing::debug!(bytes = audio.len(), mime_type = %mime_type, "recognizing uploaded clip");
            shared.notify(SessionEvent::Processing);
            let text = input.recognize_clip(&audio, &mime_type).await;
            let text = shared.recognized(text)?;

            shared.run_cycle(&text).await
        })
        .await
    }

    /// Clear the conversation
    ///
    /// # Errors
    ///
    /// Returns `Busy` if a cycle is running
    pub async fn reset(&self) -> Result<(), Failure> {
        let _guard = self.cycle.try_lock().map_err(|_| Failure::Busy)?;

        self.shared.session.write().await.reset();
        if let Some(store) = self.audio_store() {
            store.clear().await;
        }

        tracing::info!("conversation cleared");
        self.shared.notify(SessionEvent::Cleared);
        Ok(())
    }

    /// Pretty JSON export of the transcript, `None` when empty
    pub async fn export(&self) -> Option<String> {
        self.shared.session.read().await.transcript().serialize()
    }

    /// Snapshot of the transcript
    pub async fn turns(&self) -> Vec<Turn> {
        self.shared.session.read().await.transcript().turns().to_vec()
    }

    /// Snapshot of the session with metadata
    pub async fn info(&self) -> SessionInfo {
        self.shared.session.read().await.info()
    }

    /// Take the busy guard and run `work` on a task that owns it
    async fn spawn_cycle<F, Fut>(&self, work: F) -> Result<Reply, Failure>
    where
        F: FnOnce(Arc<Shared>) -> Fut,
        Fut: Future<Output = Result<Reply, Failure>> + Send + 'static,
    {
        let guard = Arc::clone(&self.cycle)
            .try_lock_owned()
            .map_err(|_| Failure::Busy)?;
        let cycle = work(Arc::clone(&self.shared));

        tokio::spawn(async move {
            let result = cycle.await;
            drop(guard);
            result
        })
        .await
        .map_err(|e| Failure::Unknown(format!("cycle task failed: {e}")))?
    }
}

impl Shared {
    fn audio_store(&self) -> Option<&Arc<AudioStore>> {
        self.speech_output.as_ref().map(SpeechOutput::store)
    }

    /// Speech input, or a reported failure when voice input is off
    fn speech_input(&self) -> Result<&SpeechInput, Failure> {
        self.speech_input.as_ref().ok_or_else(|| {
            let failure = Failure::Unknown("saisie vocale désactivée".to_string());
            tracing::info!("voice input requested while disabled");
            self.notify(SessionEvent::error(&failure));
            self.notify(SessionEvent::Idle);
            failure
        })
    }

    /// Report a recognition failure, or pass the text through
    fn recognized(&self, result: Result<String, Failure>) -> Result<String, Failure> {
        result.map_err(|failure| {
            tracing::info!(code = failure.code(), "no usable speech input");
            self.notify(SessionEvent::error(&failure));
            self.notify(SessionEvent::Idle);
            failure
        })
    }

    /// One cycle for non-blank `text`; the caller holds the cycle lock
    async fn run_cycle(&self, text: &str) -> Result<Reply, Failure> {
        let user = Turn::user(text);
        let history = self.append(user.clone()).await;

        self.notify(SessionEvent::Thinking);

        let context: &[Turn] = match self.context_mode {
            ContextMode::Latest => &[],
            ContextMode::Full => &history,
        };

        let result = self.completion.complete(context, text).await;
        let reply = match classify_completion(result) {
            Ok(reply) => reply,
            Err(failure) => {
                tracing::warn!(
                    provider = self.completion.name(),
                    error = %failure,
                    "completion failed"
                );
                self.notify(SessionEvent::error(&failure));
                self.notify(SessionEvent::Idle);
                return Err(failure);
            }
        };

        let assistant = Turn::assistant(reply);
        self.append(assistant.clone()).await;

        let audio = self.speak(assistant.content()).await;

        self.notify(SessionEvent::Idle);

        Ok(Reply {
            user,
            assistant,
            audio,
        })
    }

    /// Append a turn and return the turns that preceded it
    async fn append(&self, turn: Turn) -> Vec<Turn> {
        let mut session = self.session.write().await;
        let transcript = session.transcript_mut();
        let earlier = transcript.turns().to_vec();
        let index = transcript.len();
        transcript.append(turn.clone());
        drop(session);

        self.notify(SessionEvent::TurnAppended { index, turn });
        earlier
    }

    /// Synthesize the reply; failures are reported but never fatal
    async fn speak(&self, text: &str) -> Option<AudioArtifact> {
        let output = self.speech_output.as_ref()?;

        match output.synthesize(text).await {
            Ok(artifact) => {
                self.notify(SessionEvent::audio_ready(artifact.clone()));
                Some(artifact)
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "continuing without reply audio");
                self.notify(SessionEvent::error(&failure));
                None
            }
        }
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        self.events.send(event).ok();
    }
}

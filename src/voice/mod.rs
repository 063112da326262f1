//! Voice processing module
//!
//! Speech input (microphone capture, utterance detection, recognition) and
//! speech output (synthesis, artifact storage, local playback).

mod artifact;
mod capture;
mod detector;
mod listener;
mod output;
mod playback;
pub mod stt;
pub mod tts;

pub use artifact::{AUDIO_MIME, AudioArtifact, AudioStore};
pub use capture::{AudioCapture, AudioSource, SAMPLE_RATE, rms, samples_to_wav};
pub use detector::{DetectorState, ListenSettings, UtteranceDetector};
pub use listener::{ListenPhase, PhaseCallback, SourceFactory, SpeechInput, classify_recognition};
pub use output::SpeechOutput;
pub use playback::{AudioPlayback, DecodedAudio, decode_mp3};
pub use stt::{SpeechRecognizer, SpeechToText};
pub use tts::{SpeechSynthesizer, TextToSpeech, chunk_text};

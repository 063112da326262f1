//! Vocal Assistant - a voice and text chatbot
//!
//! This library provides the pieces behind the `vocal` binary:
//! - An in-memory conversation transcript with JSON export
//! - A client for OpenAI-compatible chat completion APIs (Groq by default)
//! - Speech input (microphone capture, utterance detection, recognition)
//! - Speech output (synthesis to an MP3 artifact, local playback)
//! - A session controller that runs one request/response cycle at a time
//! - An HTTP server with a browser UI and a live event stream
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        Browser UI  │  Terminal REPL          │
//! └─────────────────────┬────────────────────────┘
//!                       │
//! ┌─────────────────────▼────────────────────────┐
//! │              Session Controller              │
//! │  Transcript  │  Speech In  │  Speech Out     │
//! └─────────────────────┬────────────────────────┘
//!                       │
//! ┌─────────────────────▼────────────────────────┐
//! │      Completion │ Recognition │ Synthesis    │
//! │             (network services)               │
//! └──────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod completion;
pub mod config;
pub mod error;
pub mod session;
pub mod transcript;
pub mod voice;

pub use completion::{ChatCompletionClient, CompletionProvider};
pub use config::{Config, ContextMode};
pub use error::{Error, Failure, Result};
pub use session::{Reply, Session, SessionController, SessionEvent};
pub use transcript::{Role, Transcript, Turn};

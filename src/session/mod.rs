//! Conversation session and its controller
//!
//! One session lives for the whole process. It owns the transcript and is
//! reset in place when the user clears the conversation.

mod controller;
mod events;

pub use controller::{Reply, SessionController, SessionControllerBuilder};
pub use events::{SessionEvent, audio_url};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::transcript::{Transcript, Turn};

/// The single conversation held by the process
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    reset_at: Option<DateTime<Utc>>,
    transcript: Transcript,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            reset_at: None,
            transcript: Transcript::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub const fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// Empty the transcript and record when it happened
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.reset_at = Some(Utc::now());
    }

    /// Snapshot for rendering
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            started_at: self.started_at,
            reset_at: self.reset_at,
            turns: self.transcript.turns().to_vec(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub reset_at: Option<DateTime<Utc>>,
    pub turns: Vec<Turn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_identity() {
        let mut session = Session::new();
        session.transcript_mut().append(Turn::user("Salut"));
        let id = session.id();

        session.reset();

        assert_eq!(session.id(), id);
        assert!(session.transcript().is_empty());
        assert!(session.info().reset_at.is_some());
    }
}

//! Synthesized audio artifacts on disk
//!
//! Each synthesis gets a unique file name. Only the newest artifact is kept:
//! saving a new one deletes its predecessor.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::Result;

/// MIME type of stored artifacts
pub const AUDIO_MIME: &str = "audio/mpeg";

/// A synthesized reply written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioArtifact {
    /// File name inside the store directory
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub mime_type: &'static str,
    pub created_at: DateTime<Utc>,
}

/// Single-slot store for synthesized audio
pub struct AudioStore {
    dir: PathBuf,
    current: Mutex<Option<AudioArtifact>>,
}

impl AudioStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: Mutex::new(None),
        }
    }

    /// Write MP3 bytes as the new current artifact
    ///
    /// Writes are serialized; the previous artifact is removed once the new
    /// one is on disk.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written
    pub async fn save(&self, audio: &[u8]) -> Result<AudioArtifact> {
        let mut current = self.current.lock().await;

        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("reply-{}.mp3", uuid::Uuid::new_v4());
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, audio).await?;

        if let Some(previous) = current.take() {
            match tokio::fs::remove_file(&previous.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %previous.path.display(),
                    error = %e,
                    "failed to remove previous audio artifact"
                ),
            }
        }

        let artifact = AudioArtifact {
            file_name,
            path,
            mime_type: AUDIO_MIME,
            created_at: Utc::now(),
        };

        tracing::debug!(path = %artifact.path.display(), bytes = audio.len(), "saved audio artifact");
        *current = Some(artifact.clone());
        Ok(artifact)
    }

    /// The newest artifact, if any
    pub async fn current(&self) -> Option<AudioArtifact> {
        self.current.lock().await.clone()
    }

    /// Look up the current artifact by file name
    ///
    /// Only the live artifact is resolvable, so arbitrary paths can't be served.
    pub async fn resolve(&self, file_name: &str) -> Option<AudioArtifact> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|a| a.file_name == file_name)
            .cloned()
    }

    /// Delete the current artifact
    pub async fn clear(&self) {
        if let Some(previous) = self.current.lock().await.take() {
            if let Err(e) = tokio::fs::remove_file(&previous.path).await {
                tracing::debug!(path = %previous.path.display(), error = %e, "artifact already gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("audio"));

        let first = store.save(b"first").await.unwrap();
        let second = store.save(b"second").await.unwrap();

        assert_ne!(first.file_name, second.file_name);
        assert!(!first.path.exists());
        assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
        assert_eq!(store.current().await, Some(second));
    }

    #[tokio::test]
    async fn resolve_only_matches_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path());

        let first = store.save(b"one").await.unwrap();
        assert!(store.resolve(&first.file_name).await.is_some());
        assert!(store.resolve("../etc/passwd").await.is_none());

        let second = store.save(b"two").await.unwrap();
        assert!(store.resolve(&first.file_name).await.is_none());
        assert!(store.resolve(&second.file_name).await.is_some());
    }

    #[tokio::test]
    async fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path());

        let artifact = store.save(b"bytes").await.unwrap();
        store.clear().await;

        assert!(!artifact.path.exists());
        assert!(store.current().await.is_none());
    }
}

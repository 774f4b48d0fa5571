//! Audio Delivery
//!
//! Buffered artifacts are written to a public directory and handed back as a
//! URL; streamed artifacts are forwarded chunk by chunk through a guard that
//! guarantees the stream terminates.

use crate::speech::AudioStream;
use anyhow::anyhow;
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Public mount point under which stored artifacts are served.
pub const AUDIO_MOUNT: &str = "/audio";

/// What produced a stored artifact; used as part of the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Greeting,
    Reply,
}

impl ArtifactKind {
    fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Greeting => "greeting",
            ArtifactKind::Reply => "reply",
        }
    }
}

/// A stored artifact the client fetches separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioReference {
    pub file_name: String,
    pub url: String,
}

/// How the synthesized audio of one turn reaches the client.
pub enum AudioDelivery {
    /// The artifact was written to the audio directory.
    Stored(AudioReference),
    /// The artifact is forwarded to the client as it is produced.
    Streamed(AudioStream),
}

impl std::fmt::Debug for AudioDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioDelivery::Stored(reference) => f.debug_tuple("Stored").field(reference).finish(),
            AudioDelivery::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// Writes buffered artifacts under a directory served at `AUDIO_MOUNT`.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the audio directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Resolves a reference back to its location on disk.
    pub fn path_for(&self, reference: &AudioReference) -> PathBuf {
        self.dir.join(&reference.file_name)
    }

    /// Writes `audio` and returns the reference the client should fetch.
    pub async fn persist(
        &self,
        session_id: &str,
        kind: ArtifactKind,
        audio: &[u8],
    ) -> std::io::Result<AudioReference> {
        let file_name = format!(
            "arby_{}_{}_{}.mp3",
            kind.as_str(),
            sanitize_session_id(session_id),
            Uuid::new_v4().simple()
        );
        tokio::fs::write(self.dir.join(&file_name), audio).await?;
        debug!(file_name = %file_name, bytes = audio.len(), "Stored audio artifact");

        Ok(AudioReference {
            url: format!("{}/{}", AUDIO_MOUNT, file_name),
            file_name,
        })
    }
}

/// Keeps only `[A-Za-z0-9_-]` so a client-supplied key cannot leave the audio
/// directory or produce an unusable file name.
fn sanitize_session_id(session_id: &str) -> String {
    let cleaned: String = session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned
    }
}

/// Forwards chunks in order and ends the stream after the first error or after
/// any chunk takes longer than `chunk_timeout` to arrive. The failure is
/// yielded as the final item so the consumer can abort its channel.
pub fn guard_stream(inner: AudioStream, chunk_timeout: Duration) -> AudioStream {
    Box::pin(futures::stream::unfold(Some(inner), move |state| async move {
        let mut inner = state?;
        match tokio::time::timeout(chunk_timeout, inner.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(inner))),
            Ok(Some(Err(e))) => {
                warn!(error = ?e, "Audio stream failed mid-flight");
                Some((Err(e), None))
            }
            Ok(None) => None,
            Err(_) => {
                warn!(?chunk_timeout, "Audio stream stalled");
                Some((Err(anyhow!("synthesis stream timed out")), None))
            }
        }
    }))
}

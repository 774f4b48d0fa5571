//! Conversation Relay
//!
//! The orchestrator behind every public operation. A turn runs as a two-stage
//! pipeline: `generate` produces a typed `Generated` value under the session's
//! context lock, then `deliver` synthesizes and hands the audio to the client
//! either as a stored artifact or as a stream.

use crate::{
    conversation::{Role, Turn},
    delivery::{ArtifactKind, AudioDelivery, AudioStore, guard_stream},
    error::RelayError,
    llm_client::GenerationClient,
    session_store::SessionStore,
    speech::SynthesisClient,
};
use anyhow::anyhow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// The instruction sent as the user turn when a session asks for its greeting.
pub const DEFAULT_GREETING_INSTRUCTION: &str = "Speak your first greeting now.";
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-deployment knobs for the relay.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub voice_id: String,
    pub greeting_instruction: String,
    /// Upper bound on one generation call.
    pub generation_timeout: Duration,
    /// Upper bound on a buffered synthesis call, on opening a synthesis
    /// stream, and on the gap between two streamed chunks.
    pub synthesis_timeout: Duration,
}

impl RelaySettings {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            greeting_instruction: DEFAULT_GREETING_INSTRUCTION.to_string(),
            generation_timeout: DEFAULT_PROVIDER_TIMEOUT,
            synthesis_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// How the caller wants the audio of a turn delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Buffered,
    Streamed,
}

/// The outcome of one exchange: the generated text plus its audio.
#[derive(Debug)]
pub struct TurnResult {
    pub text: String,
    pub audio: AudioDelivery,
}

/// Output of the generation stage, consumed by the delivery stage.
#[derive(Debug)]
struct Generated {
    session_id: String,
    text: String,
}

/// Maps stateless requests onto per-session conversations and sequences the
/// generation and synthesis providers for each turn.
pub struct Relay {
    sessions: Arc<SessionStore>,
    generator: Arc<dyn GenerationClient>,
    synthesizer: Arc<dyn SynthesisClient>,
    audio_store: AudioStore,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        sessions: Arc<SessionStore>,
        generator: Arc<dyn GenerationClient>,
        synthesizer: Arc<dyn SynthesisClient>,
        audio_store: AudioStore,
        settings: RelaySettings,
    ) -> Self {
        Self {
            sessions,
            generator,
            synthesizer,
            audio_store,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn audio_store(&self) -> &AudioStore {
        &self.audio_store
    }

    /// Resolves or creates the session and produces its opening greeting.
    ///
    /// The greeting is always delivered as a stored artifact.
    #[instrument(name = "start_session", skip_all, fields(session_id))]
    pub async fn start_session(&self, session_id: Option<&str>) -> Result<TurnResult, RelayError> {
        let session_id = required(session_id, "sessionId")?;
        tracing::Span::current().record("session_id", session_id);
        info!("Generating greeting");

        let generated = self
            .generate(session_id, &self.settings.greeting_instruction)
            .await?;
        self.deliver(generated, ArtifactKind::Greeting, DeliveryMode::Buffered)
            .await
    }

    /// Runs one user turn: generate a reply from the full history, then
    /// synthesize it according to `mode`.
    #[instrument(name = "send_message", skip_all, fields(session_id, mode = ?mode))]
    pub async fn send_message(
        &self,
        session_id: Option<&str>,
        message: Option<&str>,
        mode: DeliveryMode,
    ) -> Result<TurnResult, RelayError> {
        let session_id = required(session_id, "sessionId")?;
        let message = required(message, "message")?;
        tracing::Span::current().record("session_id", session_id);

        let generated = self.generate(session_id, message).await?;
        self.deliver(generated, ArtifactKind::Reply, mode).await
    }

    /// Destroys a session and its whole transcript.
    #[instrument(name = "reset", skip_all, fields(session_id))]
    pub async fn reset(&self, session_id: Option<&str>) -> Result<(), RelayError> {
        let session_id = required(session_id, "sessionId")?;
        tracing::Span::current().record("session_id", session_id);

        if self.sessions.delete(session_id).await {
            info!("Reset conversation");
            Ok(())
        } else {
            Err(RelayError::UnknownSession(session_id.to_string()))
        }
    }

    /// Returns a snapshot of a session's turns, or `None` if it does not exist.
    pub async fn transcript(&self, session_id: &str) -> Option<Vec<Turn>> {
        let context = self.sessions.get(session_id).await?;
        let turns = context.lock().await.turns().to_vec();
        Some(turns)
    }

    /// Stage one. Holds the context lock from staging the user turn until both
    /// turns are committed, so turns of one session are submitted in order.
    /// Nothing is committed when generation fails.
    async fn generate(&self, session_id: &str, user_text: &str) -> Result<Generated, RelayError> {
        let context = self.sessions.get_or_create(session_id).await;
        let mut context = context.lock().await;

        let mut staged = context.turns().to_vec();
        staged.push(Turn::new(Role::User, user_text));

        let text = with_timeout(
            self.settings.generation_timeout,
            "generation",
            self.generator.generate(&staged),
        )
        .await
        .map_err(|e| {
            warn!(error = ?e, "Generation failed");
            RelayError::Generation(e)
        })?;

        context.append(Role::User, user_text);
        context.append(Role::Assistant, text.clone());
        info!(turns = context.len(), "Generated reply");

        Ok(Generated {
            session_id: session_id.to_string(),
            text,
        })
    }

    /// Stage two. Runs after the context lock is released; a failure here
    /// leaves the committed text turns in place.
    async fn deliver(
        &self,
        generated: Generated,
        kind: ArtifactKind,
        mode: DeliveryMode,
    ) -> Result<TurnResult, RelayError> {
        let limit = self.settings.synthesis_timeout;
        let voice_id = self.settings.voice_id.as_str();

        let audio = match mode {
            DeliveryMode::Buffered => {
                let bytes = with_timeout(
                    limit,
                    "synthesis",
                    self.synthesizer.synthesize(&generated.text, voice_id),
                )
                .await
                .map_err(|e| {
                    warn!(error = ?e, "Synthesis failed");
                    RelayError::Synthesis(e)
                })?;
                let reference = self
                    .audio_store
                    .persist(&generated.session_id, kind, &bytes)
                    .await?;
                AudioDelivery::Stored(reference)
            }
            DeliveryMode::Streamed => {
                let stream = with_timeout(
                    limit,
                    "synthesis",
                    self.synthesizer.synthesize_stream(&generated.text, voice_id),
                )
                .await
                .map_err(|e| {
                    warn!(error = ?e, "Synthesis stream failed to open");
                    RelayError::Synthesis(e)
                })?;
                AudioDelivery::Streamed(guard_stream(stream, limit))
            }
        };

        Ok(TurnResult {
            text: generated.text,
            audio,
        })
    }
}

/// Rejects absent and blank values as a client error.
fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, RelayError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RelayError::MissingField(field)),
    }
}

async fn with_timeout<T>(
    limit: Duration,
    stage: &'static str,
    call: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| anyhow!("{stage} timed out after {limit:?}"))?
}

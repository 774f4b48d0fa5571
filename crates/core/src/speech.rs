//! Speech Synthesis
//!
//! Adapters that turn generated text into audio. Two shapes are offered: a
//! buffered call that returns the whole artifact, and a streaming call that
//! yields chunks as the provider produces them.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use tracing::debug;

/// A stream of audio chunks from the synthesis provider.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A client for a text-to-speech provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Synthesizes `text` with `voice_id` and returns the complete artifact.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes>;

    /// Synthesizes `text` with `voice_id`, yielding chunks in provider order.
    async fn synthesize_stream(&self, text: &str, voice_id: &str) -> Result<AudioStream>;
}

pub const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// `SynthesisClient` backed by the ElevenLabs text-to-speech HTTP API.
pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model_id, ELEVENLABS_API_BASE)
    }

    /// Creates a client against a custom base URL (proxies, test servers).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, url: String, text: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("ElevenLabs returned {status}: {body}"));
        }
        Ok(response)
    }
}

#[async_trait]
impl SynthesisClient for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);
        debug!(voice_id = %voice_id, chars = text.len(), "Requesting speech synthesis");
        let audio = self.post(url, text).await?.bytes().await?;
        Ok(audio)
    }

    async fn synthesize_stream(&self, text: &str, voice_id: &str) -> Result<AudioStream> {
        let url = format!("{}/v1/text-to-speech/{}/stream", self.base_url, voice_id);
        debug!(voice_id = %voice_id, chars = text.len(), "Requesting streamed speech synthesis");
        let response = self.post(url, text).await?;
        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(anyhow::Error::from)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_synthesize_posts_text_and_returns_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .and(header("xi-api-key", "secret"))
            .and(body_json(serde_json::json!({
                "text": "Heya!",
                "model_id": DEFAULT_TTS_MODEL
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x01, 0x02]))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElevenLabsClient::with_base_url("secret", DEFAULT_TTS_MODEL, server.uri());
        let audio = client.synthesize("Heya!", "voice-1").await.unwrap();

        assert_eq!(audio.as_ref(), &[0x01, 0x02]);
    }

    #[tokio::test]
    async fn test_synthesize_stream_yields_all_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ABC".to_vec()))
            .mount(&server)
            .await;

        let client = ElevenLabsClient::with_base_url("secret", DEFAULT_TTS_MODEL, server.uri());
        let mut stream = client.synthesize_stream("Heya!", "voice-1").await.unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"ABC");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = ElevenLabsClient::with_base_url("wrong", DEFAULT_TTS_MODEL, server.uri());
        let err = client.synthesize("Heya!", "voice-1").await.unwrap_err();

        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid api key"));
        assert!(client.synthesize_stream("Heya!", "voice-1").await.is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ElevenLabsClient::with_base_url("k", "m", "http://localhost:9000/");
        assert_eq!(client.base_url, "http://localhost:9000");
    }
}

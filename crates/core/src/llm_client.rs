use crate::conversation::{Role, Turn};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use tracing::debug;

/// A client that produces the next assistant utterance for a conversation.
///
/// Implementations are stateless per call: the full ordered transcript,
/// persona first, is submitted every time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generates the next utterance given the cumulative history.
    async fn generate(&self, turns: &[Turn]) -> Result<String>;
}

/// An implementation of `GenerationClient` for any OpenAI-compatible API.
///
/// Gemini is reached through its OpenAI-compatible endpoint, so one adapter
/// covers both providers.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gemini-1.5-flash").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        // Provider faults surface to the caller after a single attempt.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config).with_backoff(no_retry),
            model,
        }
    }
}

fn to_request_message(turn: &Turn) -> Result<ChatCompletionRequestMessage> {
    let message = match turn.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(turn.text.clone())
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(turn.text.clone())
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.text.clone())
            .build()?
            .into(),
    };
    Ok(message)
}

#[async_trait]
impl GenerationClient for OpenAICompatibleClient {
    async fn generate(&self, turns: &[Turn]) -> Result<String> {
        let messages = turns
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;

        debug!(model = %self.model, turns = turns.len(), "Requesting chat completion");
        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAICompatibleClient {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base(server.uri());
        OpenAICompatibleClient::new(config, "test-model".to_string())
    }

    fn completion_body(content: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn test_to_request_message_maps_roles() {
        let system = to_request_message(&Turn::new(Role::System, "persona")).unwrap();
        let user = to_request_message(&Turn::new(Role::User, "hi")).unwrap();
        let assistant = to_request_message(&Turn::new(Role::Assistant, "Heya!")).unwrap();

        assert!(matches!(system, ChatCompletionRequestMessage::System(_)));
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));
        assert!(matches!(assistant, ChatCompletionRequestMessage::Assistant(_)));
    }

    #[tokio::test]
    async fn test_generate_sends_full_history_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!("Heya!"))))
            .expect(1)
            .mount(&server)
            .await;

        let turns = vec![
            Turn::new(Role::System, "persona"),
            Turn::new(Role::User, "hi"),
        ];
        let text = client_for(&server).generate(&turns).await.unwrap();
        assert_eq!(text, "Heya!");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "hi");
        assert_eq!(body["model"], "test-model");
    }

    #[tokio::test]
    async fn test_generate_fails_without_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!(null))))
            .mount(&server)
            .await;

        let turns = vec![Turn::new(Role::System, "persona")];
        let err = client_for(&server).generate(&turns).await.unwrap_err();
        assert!(err.to_string().contains("No content"));
    }

    #[tokio::test]
    async fn test_generate_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "message": "bad request",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": null
                }
            })))
            .mount(&server)
            .await;

        let turns = vec![Turn::new(Role::System, "persona")];
        assert!(client_for(&server).generate(&turns).await.is_err());
    }

    #[tokio::test]
    async fn test_generate_does_not_retry_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {
                    "message": "The model is overloaded.",
                    "type": "server_error",
                    "param": null,
                    "code": null
                }
            })))
            .mount(&server)
            .await;

        let turns = vec![Turn::new(Role::System, "persona")];
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client_for(&server).generate(&turns),
        )
        .await
        .expect("generation should fail promptly instead of retrying");

        assert!(result.is_err());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}

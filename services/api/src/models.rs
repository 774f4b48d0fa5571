//! API Models
//!
//! Request and response payloads for the relay endpoints, with `utoipa`
//! schemas for the OpenAPI document. Field names follow the browser client's
//! camelCase convention; snake_case aliases are accepted on input.

use arby_core::conversation::{Role, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `/greeting` and `/reset`.
#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(alias = "session_id")]
    #[schema(example = "session_1718000000000_k3j9x0abc")]
    pub session_id: Option<String>,
}

/// Body of `/chat` and `/chat-stream`.
#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(alias = "session_id")]
    #[schema(example = "session_1718000000000_k3j9x0abc")]
    pub session_id: Option<String>,
    #[schema(example = "What do you do on Sundays?")]
    pub message: Option<String>,
}

/// Generated text plus the URL of its stored audio.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub text: String,
    #[schema(example = "/audio/arby_greeting_session_1_0f8c.mp3")]
    pub audio_url: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ResetResponse {
    #[schema(example = "Conversation reset")]
    pub status: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptTurn {
    #[schema(value_type = String, example = "assistant")]
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<Turn> for TranscriptTurn {
    fn from(turn: Turn) -> Self {
        Self {
            role: turn.role,
            text: turn.text,
            created_at: turn.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub session_id: String,
    pub turns: Vec<TranscriptTurn>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_payload_accepts_camel_case_and_alias() {
        let camel: SessionPayload = serde_json::from_str(r#"{"sessionId": "s1"}"#).unwrap();
        let snake: SessionPayload = serde_json::from_str(r#"{"session_id": "s2"}"#).unwrap();

        assert_eq!(camel.session_id.as_deref(), Some("s1"));
        assert_eq!(snake.session_id.as_deref(), Some("s2"));
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let payload: MessagePayload = serde_json::from_str("{}").unwrap();

        assert!(payload.session_id.is_none());
        assert!(payload.message.is_none());
    }

    #[test]
    fn test_turn_response_uses_audio_url_key() {
        let response = TurnResponse {
            text: "Heya!".to_string(),
            audio_url: "/audio/a.mp3".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"text":"Heya!","audioUrl":"/audio/a.mp3"}"#);
    }

    #[test]
    fn test_transcript_turn_from_core_turn() {
        let turn = Turn::new(Role::Assistant, "Heya!");
        let created_at = turn.created_at;

        let view = TranscriptTurn::from(turn);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["role"], "assistant");
        assert_eq!(json["text"], "Heya!");
        assert_eq!(view.created_at, created_at);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "sessionId is required".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"sessionId is required"}"#);
    }
}

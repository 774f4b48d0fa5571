//! Axum Handlers for the Relay API
//!
//! Each handler unpacks its JSON payload, runs the matching `Relay` operation
//! and shapes the result. Client errors become 400s; provider faults are
//! logged and reported as a generic 500.

use anyhow::anyhow;
use arby_core::{DeliveryMode, RelayError, TurnResult, delivery::AudioDelivery};
use axum::{
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    models::{
        ErrorResponse, MessagePayload, ResetResponse, SessionPayload, TranscriptResponse,
        TranscriptTurn, TurnResponse,
    },
    state::AppState,
};

/// Response header carrying the percent-encoded reply text on `/chat-stream`.
pub const TEXT_RESPONSE_HEADER: &str = "x-text-response";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else {
            Self::InternalServerError(err.into())
        }
    }
}

/// Percent-encodes `text` so it survives as an ASCII header value.
pub fn encode_text_header(text: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&urlencoding::encode(text))
        .map_err(|e| ApiError::InternalServerError(e.into()))
}

fn buffered_response(result: TurnResult) -> Result<Json<TurnResponse>, ApiError> {
    match result.audio {
        AudioDelivery::Stored(reference) => Ok(Json(TurnResponse {
            text: result.text,
            audio_url: reference.url,
        })),
        AudioDelivery::Streamed(_) => Err(ApiError::InternalServerError(anyhow!(
            "buffered request produced streamed audio"
        ))),
    }
}

/// Builds the audio response. The text header is attached before any body
/// bytes are written; the body ends when the guarded stream ends.
fn streamed_response(result: TurnResult) -> Result<Response, ApiError> {
    let AudioDelivery::Streamed(stream) = result.audio else {
        return Err(ApiError::InternalServerError(anyhow!(
            "streaming request produced stored audio"
        )));
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(TEXT_RESPONSE_HEADER, encode_text_header(&result.text)?)
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::InternalServerError(e.into()))
}

/// Start (or resume) a session and return Arby's opening greeting.
#[utoipa::path(
    post,
    path = "/greeting",
    request_body = SessionPayload,
    responses(
        (status = 200, description = "Greeting generated", body = TurnResponse),
        (status = 400, description = "sessionId missing", body = ErrorResponse),
        (status = 500, description = "Provider fault", body = ErrorResponse)
    )
)]
pub async fn greeting(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SessionPayload>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let Json(payload) = payload?;
    let result = state
        .relay
        .start_session(payload.session_id.as_deref())
        .await?;
    buffered_response(result)
}

/// Send a message and receive the reply text with a URL to its stored audio.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = MessagePayload,
    responses(
        (status = 200, description = "Reply generated", body = TurnResponse),
        (status = 400, description = "sessionId or message missing", body = ErrorResponse),
        (status = 500, description = "Provider fault", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MessagePayload>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let Json(payload) = payload?;
    let result = state
        .relay
        .send_message(
            payload.session_id.as_deref(),
            payload.message.as_deref(),
            DeliveryMode::Buffered,
        )
        .await?;
    buffered_response(result)
}

/// Send a message and receive the reply audio as a stream.
///
/// The body is `audio/mpeg`; the reply text travels percent-encoded in the
/// `x-text-response` header.
#[utoipa::path(
    post,
    path = "/chat-stream",
    request_body = MessagePayload,
    responses(
        (status = 200, description = "Audio stream (audio/mpeg)",
            headers(("x-text-response" = String, description = "Percent-encoded reply text"))),
        (status = 400, description = "sessionId or message missing", body = ErrorResponse),
        (status = 500, description = "Provider fault", body = ErrorResponse)
    )
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MessagePayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let result = state
        .relay
        .send_message(
            payload.session_id.as_deref(),
            payload.message.as_deref(),
            DeliveryMode::Streamed,
        )
        .await?;
    streamed_response(result)
}

/// Forget a session's conversation.
#[utoipa::path(
    post,
    path = "/reset",
    request_body = SessionPayload,
    responses(
        (status = 200, description = "Conversation reset", body = ResetResponse),
        (status = 400, description = "sessionId missing or unknown", body = ErrorResponse)
    )
)]
pub async fn reset(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SessionPayload>, JsonRejection>,
) -> Result<Json<ResetResponse>, ApiError> {
    let Json(payload) = payload?;
    state.relay.reset(payload.session_id.as_deref()).await?;
    Ok(Json(ResetResponse {
        status: "Conversation reset".to_string(),
    }))
}

/// Get the turns recorded for a session, persona first.
#[utoipa::path(
    get,
    path = "/sessions/{sessionId}/turns",
    responses(
        (status = 200, description = "Session transcript", body = TranscriptResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("sessionId" = String, Path, description = "Session ID")
    )
)]
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let turns = state
        .relay
        .transcript(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session '{}' not found", session_id)))?;

    Ok(Json(TranscriptResponse {
        session_id,
        turns: turns.into_iter().map(TranscriptTurn::from).collect(),
    }))
}

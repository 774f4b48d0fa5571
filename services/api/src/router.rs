//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the relay endpoints, the static audio and image mounts, and the
//! OpenAPI documentation.

use crate::{
    handlers::{self, TEXT_RESPONSE_HEADER},
    models::{
        ErrorResponse, MessagePayload, ResetResponse, SessionPayload, TranscriptResponse,
        TranscriptTurn, TurnResponse,
    },
    state::AppState,
};

use arby_core::delivery::AUDIO_MOUNT;
use axum::{
    Router,
    http::HeaderName,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::greeting,
        handlers::chat,
        handlers::chat_stream,
        handlers::reset,
        handlers::get_transcript,
    ),
    components(
        schemas(SessionPayload, MessagePayload, TurnResponse, ResetResponse, TranscriptResponse, TranscriptTurn, ErrorResponse)
    ),
    tags(
        (name = "Arby API", description = "Conversation relay for the Arby voice character")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let audio_files = ServeDir::new(app_state.relay.audio_store().dir());
    let image_files = ServeDir::new(&app_state.images_dir);

    let api_router = Router::new()
        .route("/greeting", post(handlers::greeting))
        .route("/chat", post(handlers::chat))
        .route("/chat-stream", post(handlers::chat_stream))
        .route("/reset", post(handlers::reset))
        .route("/sessions/{sessionId}/turns", get(handlers::get_transcript))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .nest_service(AUDIO_MOUNT, audio_files)
        .nest_service("/images", image_files)
}

/// Permissive CORS that still lets browsers read the streamed reply text.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(TEXT_RESPONSE_HEADER)])
}

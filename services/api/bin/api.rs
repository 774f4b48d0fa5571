//! Main Entrypoint for the Arby API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the persona and greeting prompts.
//! 3. Initializing the generation and synthesis clients and the audio store.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use arby_api::{
    config::Config,
    router::{cors_layer, create_router},
    state::AppState,
};
use arby_core::{
    Relay, RelaySettings,
    delivery::AudioStore,
    llm_client::{GenerationClient, OpenAICompatibleClient},
    session_store::SessionStore,
    speech::{ElevenLabsClient, SynthesisClient},
};
use async_openai::config::OpenAIConfig;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in std::fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Prompts ---
    let prompts = load_prompts(&config.prompts_path)?;
    let persona = prompts
        .get("persona")
        .context("persona.md not found in prompts directory")?
        .trim()
        .to_string();

    let mut settings = RelaySettings::new(config.voice_id.clone());
    settings.generation_timeout = config.generation_timeout;
    settings.synthesis_timeout = config.synthesis_timeout;
    if let Some(greeting) = prompts.get("greeting") {
        settings.greeting_instruction = greeting.trim().to_string();
    }

    // --- 4. Initialize Provider Clients ---
    let api_key = config
        .llm_api_key()
        .context("No API key configured for the generation provider")?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.provider.api_base());
    let generator: Arc<dyn GenerationClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));
    let synthesizer: Arc<dyn SynthesisClient> = Arc::new(ElevenLabsClient::with_base_url(
        config.elevenlabs_api_key.clone(),
        config.tts_model.clone(),
        config.elevenlabs_base_url.clone(),
    ));

    let audio_store = AudioStore::new(&config.audio_dir);
    audio_store
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create audio directory {}", config.audio_dir.display()))?;

    let relay = Relay::new(
        Arc::new(SessionStore::new(persona)),
        generator,
        synthesizer,
        audio_store,
        settings,
    );

    let app_state = Arc::new(AppState {
        relay: Arc::new(relay),
        images_dir: config.images_dir.clone(),
    });

    // --- 5. Create Router and Apply Middleware ---
    let app = create_router(app_state).layer(cors_layer());

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        tts_model = %config.tts_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported text-generation providers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    /// The model used when `CHAT_MODEL` is not set.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }

    /// The OpenAI-compatible base URL for this provider.
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_base_url: String,
    pub voice_id: String,
    pub tts_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub audio_dir: PathBuf,
    pub images_dir: PathBuf,
    pub generation_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of 'gemini', 'openai'", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| provider.default_model().to_string());

        let elevenlabs_api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| ConfigError::MissingVar("ELEVENLABS_API_KEY".to_string()))?;
        let elevenlabs_base_url = std::env::var("ELEVENLABS_BASE_URL")
            .unwrap_or_else(|_| arby_core::speech::ELEVENLABS_API_BASE.to_string());
        let voice_id = std::env::var("VOICE_ID")
            .or_else(|_| std::env::var("ARBYS_VOICE_ID"))
            .map_err(|_| ConfigError::MissingVar("VOICE_ID".to_string()))?;
        let tts_model = std::env::var("TTS_MODEL")
            .unwrap_or_else(|_| arby_core::speech::DEFAULT_TTS_MODEL.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));
        let audio_dir = std::env::var("AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public/audio"));
        let images_dir = std::env::var("IMAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public/images"));

        let generation_timeout = timeout_from_env("GENERATION_TIMEOUT_SECS")?;
        let synthesis_timeout = timeout_from_env("SYNTHESIS_TIMEOUT_SECS")?;

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            elevenlabs_api_key,
            elevenlabs_base_url,
            voice_id,
            tts_model,
            log_level,
            prompts_path,
            audio_dir,
            images_dir,
            generation_timeout,
            synthesis_timeout,
        })
    }

    /// The API key for the configured generation provider.
    pub fn llm_api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}

/// Reads a whole number of seconds, defaulting to 30. Zero is rejected.
fn timeout_from_env(var: &str) -> Result<Duration, ConfigError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(arby_core::relay::DEFAULT_PROVIDER_TIMEOUT);
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' is not a positive number of seconds", raw),
        )),
    }
}

//! Arby Core
//!
//! Domain logic for the conversation relay: per-session transcripts, the
//! provider adapters for text generation and speech synthesis, audio delivery,
//! and the `Relay` orchestrator that sequences them.

pub mod conversation;
pub mod delivery;
pub mod error;
pub mod llm_client;
pub mod relay;
pub mod session_store;
pub mod speech;

pub use error::RelayError;
pub use relay::{DeliveryMode, Relay, RelaySettings, TurnResult};

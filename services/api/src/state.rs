//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the resources shared
//! by every handler: the relay (and through it the session store and provider
//! clients) plus the static file locations.

use arby_core::Relay;
use std::path::PathBuf;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub images_dir: PathBuf,
}

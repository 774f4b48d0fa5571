//! Session Store
//!
//! Maps opaque session keys to their conversation context. This is the only
//! shared mutable state in the relay; it is owned by the `Relay` and never
//! reachable as a global.

use crate::conversation::ConversationContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// A conversation context shared between the store and in-flight requests.
pub type SharedContext = Arc<Mutex<ConversationContext>>;

/// In-memory session map guarded by a single map-level lock.
///
/// Sessions live until `delete` is called; there is no expiry.
pub struct SessionStore {
    persona: String,
    sessions: Mutex<HashMap<String, SharedContext>>,
}

impl SessionStore {
    /// Creates an empty store. Every new context is seeded with `persona`.
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the context for `session_id`, creating it on first contact.
    ///
    /// Repeated calls return the same `Arc` until the session is deleted.
    pub async fn get_or_create(&self, session_id: &str) -> SharedContext {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(session_id) {
            return existing.clone();
        }

        info!(session_id = %session_id, "Starting new conversation");
        let context = Arc::new(Mutex::new(ConversationContext::new(self.persona.clone())));
        sessions.insert(session_id.to_string(), context.clone());
        context
    }

    /// Looks up a session without creating it.
    pub async fn get(&self, session_id: &str) -> Option<SharedContext> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Removes a session. Returns `false` if the key was not present.
    pub async fn delete(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

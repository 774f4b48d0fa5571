//! Conversation Context
//!
//! An ordered, append-only transcript for one session. The first turn is always
//! the persona instruction, seeded exactly once when the context is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The speaker of a single turn.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One utterance in a conversation, tagged with its speaker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// The full transcript submitted to the generation provider on every turn.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: Vec<Turn>,
}

impl ConversationContext {
    /// Creates a context holding only the persona turn.
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::new(Role::System, persona)],
        }
    }

    /// Appends a turn. Content is not validated here; callers reject empty
    /// input before it reaches the context.
    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn::new(role, text));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

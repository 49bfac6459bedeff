//! Transcript entries.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::personas::welcome_message;

/// Id of the greeting that seeds every transcript.
pub const WELCOME_MESSAGE_ID: &str = "welcome";

/// Who authored a transcript entry. The system persona is never part of the
/// visible transcript; it is injected when a request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a session
    pub id: String,
    pub role: Role,
    /// For a streaming assistant message this grows until finalized
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The synthetic greeting derived from a persona.
    pub fn welcome(persona: &str) -> Self {
        Self {
            id: WELCOME_MESSAGE_ID.to_string(),
            ..Self::assistant(welcome_message(persona))
        }
    }

    pub fn is_welcome(&self) -> bool {
        self.id == WELCOME_MESSAGE_ID
    }

    /// Hours and minutes in local time, for display next to the message.
    pub fn display_time(&self) -> String {
        self.created_at.with_timezone(&Local).format("%H:%M").to_string()
    }

    /// Wire form for the completion endpoint.
    pub fn to_wire(&self) -> completion_client::Message {
        match self.role {
            Role::User => completion_client::Message::user(self.content.clone()),
            Role::Assistant => completion_client::Message::assistant(self.content.clone()),
        }
    }
}

//! Session events.

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::session::SessionId;

/// Every observable change to a session, in the order it happened.
///
/// Published on the session's broadcast channel. Serialized with a `type`
/// tag so SSE endpoints can use it as the event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The composed input was replaced
    InputChanged { session_id: SessionId, text: String },

    /// A user message was added to the transcript
    MessageAppended { session_id: SessionId, message: Message },

    /// A request for the given user message is in flight
    GenerationStarted {
        session_id: SessionId,
        in_reply_to: String,
    },

    /// The streaming assistant message grew by `delta`; `content` is the
    /// whole text so far
    TokenDelta {
        session_id: SessionId,
        message_id: String,
        delta: String,
        content: String,
    },

    /// The response finished; `message` is the finalized assistant message,
    /// absent when the endpoint produced no text
    GenerationComplete {
        session_id: SessionId,
        message: Option<Message>,
    },

    /// The turn failed; any partial assistant message was discarded
    GenerationError { session_id: SessionId, error: String },

    /// The turn was cancelled; any partial assistant message was discarded
    GenerationCancelled { session_id: SessionId },
}

impl SessionEvent {
    /// Event name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::InputChanged { .. } => "input_changed",
            SessionEvent::MessageAppended { .. } => "message_appended",
            SessionEvent::GenerationStarted { .. } => "generation_started",
            SessionEvent::TokenDelta { .. } => "token_delta",
            SessionEvent::GenerationComplete { .. } => "generation_complete",
            SessionEvent::GenerationError { .. } => "generation_error",
            SessionEvent::GenerationCancelled { .. } => "generation_cancelled",
        }
    }

    /// Whether this event closes a turn.
    pub fn ends_turn(&self) -> bool {
        matches!(
            self,
            SessionEvent::GenerationComplete { .. }
                | SessionEvent::GenerationError { .. }
                | SessionEvent::GenerationCancelled { .. }
        )
    }
}

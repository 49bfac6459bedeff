//! Errors surfaced by a chat turn.

use completion_client::CompletionError;
use thiserror::Error;

/// Why a turn failed. The `Display` text is what a session reports as its
/// last error, so it is written for the person chatting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The endpoint could not be reached or the connection broke
    #[error("Could not reach the assistant: {0}")]
    Transport(String),

    /// The endpoint answered with an error status or payload
    #[error("The assistant service returned an error: {0}")]
    Endpoint(String),

    /// The response could not be understood
    #[error("The assistant sent a response that could not be read: {0}")]
    Protocol(String),

    /// The stream ended without a completion signal
    #[error("The response ended before it was complete")]
    Incomplete,
}

impl From<CompletionError> for ChatError {
    fn from(error: CompletionError) -> Self {
        match error {
            CompletionError::Network(e) | CompletionError::Stream(e) => ChatError::Transport(e),
            CompletionError::Config(e) => ChatError::Transport(format!("client misconfigured: {}", e)),
            CompletionError::Api { status, message } => {
                ChatError::Endpoint(format!("{} (status {})", message, status))
            }
            CompletionError::Parse(e) => ChatError::Protocol(e),
        }
    }
}

//! Error types for the completion client.

use thiserror::Error;

/// Result type for completion client operations.
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Completion client errors.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error before a response arrived (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response or an error payload inside the stream
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected chunk format)
    #[error("Parse error: {0}")]
    Parse(String),

    /// The response body broke off mid-stream
    #[error("Stream error: {0}")]
    Stream(String),
}

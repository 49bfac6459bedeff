//! Streaming client for OpenAI-compatible chat completion endpoints.
//!
//! A small client with no knowledge of agents or sessions: it sends a
//! message list and hands back an ordered stream of text fragments that
//! ends with an explicit completion signal or an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use completion_client::{ChatRequest, CompletionClient, Message, StreamEvent};
//! use futures::StreamExt;
//!
//! let client = CompletionClient::from_env()?;
//!
//! let mut stream = client
//!     .chat_completion_stream(
//!         ChatRequest::new("gpt-4o-mini")
//!             .message(Message::system("You are a helpful assistant."))
//!             .message(Message::user("Hello!")),
//!     )
//!     .await?;
//!
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         StreamEvent::Fragment(text) => print!("{text}"),
//!         StreamEvent::Done => break,
//!     }
//! }
//! ```

pub mod error;
pub mod streaming;
pub mod types;

pub use error::{CompletionError, Result};
pub use streaming::{CompletionStream, StreamEvent};
pub use types::*;

use std::time::Duration;

use reqwest::{header, Client};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat completion client.
#[derive(Clone)]
pub struct CompletionClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CompletionClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create from `OPENAI_API_KEY`, honouring `CHAT_API_BASE_URL` when set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CompletionError::Config("OPENAI_API_KEY not set".into()))?;
        let client = Self::new(api_key);
        Ok(match std::env::var("CHAT_API_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
            _ => client,
        })
    }

    /// Set a custom base URL (for proxies or compatible providers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound how long to wait for the response to start streaming.
    ///
    /// The body itself is not time-limited; a long answer keeps streaming.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Streaming chat completion.
    ///
    /// Resolves once the endpoint has accepted the request; the returned
    /// stream then yields fragments in arrival order. Dropping the stream
    /// closes the underlying connection.
    pub async fn chat_completion_stream(&self, request: ChatRequest) -> Result<CompletionStream> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending streaming chat completion"
        );

        let send = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "text/event-stream")
            .json(&request)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Completion request timed out");
                CompletionError::Network(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                warn!(error = %e, "Completion streaming request failed");
                CompletionError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Completion endpoint returned an error");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: api_error_message(&error_text),
            });
        }

        Ok(CompletionStream::new(response.bytes_stream()))
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| truncate_to_char_boundary(body.trim(), 500).to_string())
}

//! Seam between sessions and the hosted completion endpoint.

use std::pin::Pin;

use async_trait::async_trait;
use completion_client::{ChatRequest, CompletionClient, StreamEvent};
use futures::stream::{Stream, StreamExt};

use crate::error::ChatError;
use crate::message::Message;

/// Ordered fragments of one response, ending with `Done` or an error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ChatError>> + Send>>;

/// What a session sends for one turn: the visible transcript plus the
/// persona as an out-of-band instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub agent_context: String,
    pub transcript: Vec<Message>,
}

impl CompletionRequest {
    /// Endpoint messages with the persona injected as the leading system
    /// message.
    pub fn to_wire_messages(&self) -> Vec<completion_client::Message> {
        std::iter::once(completion_client::Message::system(self.agent_context.clone()))
            .chain(self.transcript.iter().map(Message::to_wire))
            .collect()
    }
}

/// A streaming completion provider.
///
/// Returning `Ok` means the endpoint accepted the request; everything after
/// that arrives through the stream.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<FragmentStream, ChatError>;
}

/// Backend for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: CompletionClient,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiBackend {
    pub fn new(client: CompletionClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let chat = ChatRequest::new(self.model.clone()).messages(request.to_wire_messages());
        match self.temperature {
            Some(t) => chat.temperature(t),
            None => chat,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<FragmentStream, ChatError> {
        let stream = self
            .client
            .chat_completion_stream(self.build_request(&request))
            .await?;

        Ok(Box::pin(stream.map(|event| event.map_err(ChatError::from))))
    }
}

//! Chat session controller.
//!
//! A session owns one conversation with one department agent: the
//! transcript, the composed input, and the single in-flight request.
//!
//! ```text
//! idle --submit--> awaiting_response --done-----> idle
//!                                    --failure--> errored --submit--> awaiting_response
//!                                    --cancel---> idle
//! ```
//!
//! Each accepted submission opens a turn and spawns a task that consumes the
//! response stream. The task applies fragments under the state lock and
//! publishes a [`SessionEvent`] for each one, so subscribers see every
//! increment. Updates from a turn that is no longer current (cancelled, or
//! the session was dropped) are ignored.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use completion_client::StreamEvent;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::error::ChatError;
use crate::events::SessionEvent;
use crate::message::Message;
use crate::personas;

/// Session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    AwaitingResponse,
    Errored,
}

/// Result of [`ChatSession::submit`]. Rejections are not errors: the
/// session is left exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted,
    /// The composed input was empty or whitespace
    EmptyInput,
    /// A response is already in flight
    Busy,
}

/// Everything a presentation layer needs to render a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub department_id: String,
    pub agent_id: String,
    pub agent_context: String,
    pub transcript: Vec<Message>,
    pub pending_input: String,
    pub status: SessionStatus,
    pub last_error: Option<String>,
    /// Id of the assistant message still being streamed, if any
    pub streaming_message_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Broadcast buffer per session; slow subscribers past this lag
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { event_capacity: 256 }
    }
}

struct SessionState {
    transcript: Vec<Message>,
    pending_input: String,
    status: SessionStatus,
    last_error: Option<ChatError>,
    /// Index of the assistant message being streamed
    streaming: Option<usize>,
    turn: u64,
    in_flight: Option<CancellationToken>,
}

struct Shared {
    id: SessionId,
    department_id: String,
    agent_id: String,
    agent_context: String,
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    /// Parent of every turn's token; cancelled when the session is dropped
    shutdown: CancellationToken,
}

impl Shared {
    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Apply one fragment. Returns false once the turn is stale.
    async fn append_fragment(&self, turn: u64, text: &str) -> bool {
        let mut state = self.state.write().await;
        if state.turn != turn || state.status != SessionStatus::AwaitingResponse {
            return false;
        }

        let streaming = state.streaming;
        let index = match streaming {
            Some(index) => {
                state.transcript[index].content.push_str(text);
                index
            }
            None => {
                state.transcript.push(Message::assistant(text));
                let index = state.transcript.len() - 1;
                state.streaming = Some(index);
                index
            }
        };

        let message = &state.transcript[index];
        self.publish(SessionEvent::TokenDelta {
            session_id: self.id,
            message_id: message.id.clone(),
            delta: text.to_string(),
            content: message.content.clone(),
        });
        true
    }

    async fn complete(&self, turn: u64, fragments: usize, started: Instant) {
        let mut state = self.state.write().await;
        if state.turn != turn || state.status != SessionStatus::AwaitingResponse {
            return;
        }

        state.status = SessionStatus::Idle;
        state.in_flight = None;
        let streaming = state.streaming.take();
        let message = streaming.map(|index| state.transcript[index].clone());

        match &message {
            Some(message) => info!(
                session_id = %self.id,
                fragments,
                content_length = message.content.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Generation complete"
            ),
            None => warn!(session_id = %self.id, "Generation completed without any text"),
        }

        self.publish(SessionEvent::GenerationComplete {
            session_id: self.id,
            message,
        });
    }

    async fn fail(&self, turn: u64, error: ChatError) {
        let mut state = self.state.write().await;
        if state.turn != turn || state.status != SessionStatus::AwaitingResponse {
            return;
        }

        if let Some(index) = state.streaming.take() {
            state.transcript.remove(index);
        }
        state.status = SessionStatus::Errored;
        state.in_flight = None;
        state.last_error = Some(error.clone());

        warn!(session_id = %self.id, error = %error, "Generation failed");

        self.publish(SessionEvent::GenerationError {
            session_id: self.id,
            error: error.to_string(),
        });
    }
}

/// A live conversation with one department agent.
///
/// Dropping the session cancels any in-flight request and closes its
/// response stream.
pub struct ChatSession {
    shared: Arc<Shared>,
    backend: Arc<dyn CompletionBackend>,
}

impl ChatSession {
    /// Start a conversation: resolve the persona and seed the transcript
    /// with the welcome message.
    pub fn initialize(
        department_id: impl Into<String>,
        agent_id: impl Into<String>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self::with_config(department_id, agent_id, backend, SessionConfig::default())
    }

    pub fn with_config(
        department_id: impl Into<String>,
        agent_id: impl Into<String>,
        backend: Arc<dyn CompletionBackend>,
        config: SessionConfig,
    ) -> Self {
        let department_id = department_id.into();
        let agent_id = agent_id.into();
        let agent_context = personas::resolve(&department_id, &agent_id).to_string();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let id = SessionId::new();

        info!(
            session_id = %id,
            department_id = %department_id,
            agent_id = %agent_id,
            "Chat session created"
        );

        let state = SessionState {
            transcript: vec![Message::welcome(&agent_context)],
            pending_input: String::new(),
            status: SessionStatus::Idle,
            last_error: None,
            streaming: None,
            turn: 0,
            in_flight: None,
        };

        Self {
            shared: Arc::new(Shared {
                id,
                department_id,
                agent_id,
                agent_context,
                state: RwLock::new(state),
                events,
                shutdown: CancellationToken::new(),
            }),
            backend,
        }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn department_id(&self) -> &str {
        &self.shared.department_id
    }

    pub fn agent_id(&self) -> &str {
        &self.shared.agent_id
    }

    /// The persona fixed at creation.
    pub fn agent_context(&self) -> &str {
        &self.shared.agent_context
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.state.read().await;
        self.build_snapshot(&state)
    }

    /// Snapshot plus a receiver that starts right after it, with no gap.
    pub async fn snapshot_and_subscribe(&self) -> (SessionSnapshot, broadcast::Receiver<SessionEvent>) {
        // Events are published under the write lock, so none can slip in here
        let state = self.shared.state.read().await;
        let rx = self.shared.events.subscribe();
        (self.build_snapshot(&state), rx)
    }

    fn build_snapshot(&self, state: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            id: self.shared.id,
            department_id: self.shared.department_id.clone(),
            agent_id: self.shared.agent_id.clone(),
            agent_context: self.shared.agent_context.clone(),
            transcript: state.transcript.clone(),
            pending_input: state.pending_input.clone(),
            status: state.status,
            last_error: state.last_error.as_ref().map(ToString::to_string),
            streaming_message_id: state.streaming.map(|i| state.transcript[i].id.clone()),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.shared.state.read().await.status
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.shared.state.read().await.transcript.clone()
    }

    pub async fn last_error(&self) -> Option<ChatError> {
        self.shared.state.read().await.last_error.clone()
    }

    /// Replace the composed input. Allowed in any status.
    pub async fn update_input(&self, text: impl Into<String>) {
        let text = text.into();
        let mut state = self.shared.state.write().await;
        state.pending_input = text.clone();
        self.shared.publish(SessionEvent::InputChanged {
            session_id: self.shared.id,
            text,
        });
    }

    /// Send the composed input as a new user turn.
    ///
    /// Rejected without any change while a response is in flight or when the
    /// input is blank. Otherwise the user message is appended, the input is
    /// cleared, the status becomes `AwaitingResponse` and the request is
    /// issued in the background.
    pub async fn submit(&self) -> SubmitOutcome {
        let mut state = self.shared.state.write().await;

        if state.status == SessionStatus::AwaitingResponse {
            debug!(session_id = %self.shared.id, "Submit ignored: response in flight");
            return SubmitOutcome::Busy;
        }
        if state.pending_input.trim().is_empty() {
            debug!(session_id = %self.shared.id, "Submit ignored: empty input");
            return SubmitOutcome::EmptyInput;
        }

        let message = Message::user(std::mem::take(&mut state.pending_input));
        state.transcript.push(message.clone());
        state.status = SessionStatus::AwaitingResponse;
        state.last_error = None;
        state.turn += 1;

        let turn = state.turn;
        let token = self.shared.shutdown.child_token();
        state.in_flight = Some(token.clone());

        let request = CompletionRequest {
            agent_context: self.shared.agent_context.clone(),
            transcript: state.transcript.clone(),
        };

        info!(
            session_id = %self.shared.id,
            turn,
            transcript_length = state.transcript.len(),
            "Turn submitted"
        );

        self.shared.publish(SessionEvent::InputChanged {
            session_id: self.shared.id,
            text: String::new(),
        });
        self.shared.publish(SessionEvent::MessageAppended {
            session_id: self.shared.id,
            message: message.clone(),
        });
        self.shared.publish(SessionEvent::GenerationStarted {
            session_id: self.shared.id,
            in_reply_to: message.id,
        });

        tokio::spawn(run_turn(
            self.shared.clone(),
            self.backend.clone(),
            request,
            turn,
            token,
        ));

        SubmitOutcome::Accepted
    }

    /// Abort the in-flight request, discarding any partial answer.
    ///
    /// Returns false when nothing was in flight.
    pub async fn cancel(&self) -> bool {
        let mut state = self.shared.state.write().await;
        if state.status != SessionStatus::AwaitingResponse {
            return false;
        }

        if let Some(token) = state.in_flight.take() {
            token.cancel();
        }
        // Invalidate anything the turn's task still tries to apply
        state.turn += 1;
        if let Some(index) = state.streaming.take() {
            state.transcript.remove(index);
        }
        state.status = SessionStatus::Idle;

        info!(session_id = %self.shared.id, "Generation cancelled");

        self.shared.publish(SessionEvent::GenerationCancelled {
            session_id: self.shared.id,
        });
        true
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        debug!(session_id = %self.shared.id, "Chat session dropped");
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.shared.id)
            .field("department_id", &self.shared.department_id)
            .field("agent_id", &self.shared.agent_id)
            .finish_non_exhaustive()
    }
}

/// Consume one response stream. Returning drops the stream, which closes
/// the connection.
async fn run_turn(
    shared: Arc<Shared>,
    backend: Arc<dyn CompletionBackend>,
    request: CompletionRequest,
    turn: u64,
    token: CancellationToken,
) {
    let started = Instant::now();

    let result = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        result = backend.stream_completion(request) => result,
    };

    let mut stream = match result {
        Ok(stream) => stream,
        Err(e) => {
            shared.fail(turn, e).await;
            return;
        }
    };

    let mut fragments = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(session_id = %shared.id, turn, "Turn task stopped");
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(StreamEvent::Fragment(text))) if text.is_empty() => continue,
            Some(Ok(StreamEvent::Fragment(text))) => {
                fragments += 1;
                if !shared.append_fragment(turn, &text).await {
                    return;
                }
            }
            Some(Ok(StreamEvent::Done)) => {
                shared.complete(turn, fragments, started).await;
                return;
            }
            Some(Err(e)) => {
                shared.fail(turn, e).await;
                return;
            }
            None => {
                shared.fail(turn, ChatError::Incomplete).await;
                return;
            }
        }
    }
}

//! Department agents and streaming chat sessions.
//!
//! Each department offers a few specialised agents. Picking one resolves a
//! persona (the agent's standing instructions) and opens a [`ChatSession`]
//! that keeps the transcript, sends it with the persona to a completion
//! backend, and grows the assistant's answer fragment by fragment.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agent_chat::{ChatSession, OpenAiBackend, SessionEvent};
//! use completion_client::CompletionClient;
//!
//! let backend = Arc::new(OpenAiBackend::new(CompletionClient::from_env()?, "gpt-4o-mini"));
//! let session = ChatSession::initialize("finance", "expenses", backend);
//! let mut events = session.subscribe();
//!
//! session.update_input("Can I expense a client dinner?").await;
//! session.submit().await;
//!
//! while let Ok(event) = events.recv().await {
//!     if let SessionEvent::TokenDelta { delta, .. } = &event {
//!         print!("{delta}");
//!     }
//!     if event.ends_turn() {
//!         break;
//!     }
//! }
//! ```

pub mod backend;
pub mod error;
pub mod events;
pub mod message;
pub mod personas;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{CompletionBackend, CompletionRequest, FragmentStream, OpenAiBackend};
pub use completion_client::StreamEvent;
pub use error::ChatError;
pub use events::SessionEvent;
pub use message::{Message, Role};
pub use personas::{Department, PersonaEntry, FALLBACK_PERSONA};
pub use session::{
    ChatSession, SessionConfig, SessionId, SessionSnapshot, SessionStatus, SubmitOutcome,
};

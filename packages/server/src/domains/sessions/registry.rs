//! In-memory registry of chat sessions, keyed by session id.
//!
//! A session lives until it is deleted or until the last stream viewer
//! that attached to it disconnects.

use std::collections::HashMap;
use std::sync::Arc;

use agent_chat::{ChatSession, CompletionBackend, SessionConfig, SessionId};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session not found")]
    NotFound,

    #[error("Session belongs to another user")]
    Forbidden,
}

struct SessionEntry {
    owner: String,
    session: Arc<ChatSession>,
    viewers: usize,
}

/// Held by an open stream. Dropping the last one discards the session.
pub struct ViewerGuard {
    registry: SessionRegistry,
    id: SessionId,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        let id = self.id;

        // Nothing to clean up once the runtime itself is gone
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { registry.detach_viewer(id).await });
        }
    }
}

/// Thread-safe, cloneable. Every session shares one completion backend.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    backend: Arc<dyn CompletionBackend>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_config(backend, SessionConfig::default())
    }

    pub fn with_config(backend: Arc<dyn CompletionBackend>, config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            backend,
            config,
        }
    }

    /// Open a session for `owner`.
    pub async fn create(&self, owner: &str, department_id: &str, agent_id: &str) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession::with_config(
            department_id,
            agent_id,
            self.backend.clone(),
            self.config.clone(),
        ));

        self.sessions.write().await.insert(
            session.id(),
            SessionEntry {
                owner: owner.to_string(),
                session: session.clone(),
                viewers: 0,
            },
        );

        session
    }

    /// Look up a session owned by `owner`.
    pub async fn get(&self, owner: &str, id: SessionId) -> Result<Arc<ChatSession>, RegistryError> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&id).ok_or(RegistryError::NotFound)?;
        if entry.owner != owner {
            return Err(RegistryError::Forbidden);
        }
        Ok(entry.session.clone())
    }

    /// Register a stream viewer on a session owned by `owner`.
    pub async fn attach_viewer(
        &self,
        owner: &str,
        id: SessionId,
    ) -> Result<(Arc<ChatSession>, ViewerGuard), RegistryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or(RegistryError::NotFound)?;
        if entry.owner != owner {
            return Err(RegistryError::Forbidden);
        }

        entry.viewers += 1;
        debug!(session_id = %id, viewers = entry.viewers, "Viewer attached");

        let guard = ViewerGuard {
            registry: self.clone(),
            id,
        };
        Ok((entry.session.clone(), guard))
    }

    async fn detach_viewer(&self, id: SessionId) {
        let entry = {
            let mut sessions = self.sessions.write().await;
            let Some(entry) = sessions.get_mut(&id) else {
                return;
            };
            entry.viewers = entry.viewers.saturating_sub(1);
            if entry.viewers > 0 {
                debug!(session_id = %id, viewers = entry.viewers, "Viewer detached");
                return;
            }
            sessions.remove(&id)
        };

        if let Some(entry) = entry {
            entry.session.cancel().await;
            info!(session_id = %id, "Last viewer left, session discarded");
        }
    }

    /// Discard a session, cancelling its in-flight turn.
    pub async fn remove(&self, owner: &str, id: SessionId) -> Result<(), RegistryError> {
        let entry = {
            let mut sessions = self.sessions.write().await;
            let owned = sessions
                .get(&id)
                .map(|entry| entry.owner == owner)
                .ok_or(RegistryError::NotFound)?;
            if !owned {
                return Err(RegistryError::Forbidden);
            }
            sessions.remove(&id)
        };

        if let Some(entry) = entry {
            entry.session.cancel().await;
            info!(session_id = %id, "Session discarded");
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

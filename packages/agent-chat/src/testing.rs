//! Scripted completion backend for tests.
//!
//! Each call to `stream_completion` consumes the next queued script. Scripts
//! either replay fixed fragments or are driven step by step through a
//! [`TurnHandle`], which lets a test observe the session between fragments.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use completion_client::StreamEvent;
use tokio::sync::mpsc;

use crate::backend::{CompletionBackend, CompletionRequest, FragmentStream};
use crate::error::ChatError;

type Step = Result<StreamEvent, ChatError>;

enum Script {
    Replay(Vec<Step>),
    Driven(mpsc::UnboundedReceiver<Step>),
    Reject(ChatError),
}

/// Controls one driven turn. Dropping the handle ends the stream without a
/// completion signal.
pub struct TurnHandle {
    tx: mpsc::UnboundedSender<Step>,
}

impl TurnHandle {
    pub fn fragment(&self, text: &str) {
        let _ = self.tx.send(Ok(StreamEvent::Fragment(text.to_string())));
    }

    pub fn finish(&self) {
        let _ = self.tx.send(Ok(StreamEvent::Done));
    }

    pub fn fail(&self, error: ChatError) {
        let _ = self.tx.send(Err(error));
    }

    /// Whether the session has dropped the response stream.
    pub fn is_released(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until the session drops the response stream.
    pub async fn released(&self) {
        self.tx.closed().await
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a turn that streams `fragments` and completes.
    pub fn reply(&self, fragments: &[&str]) {
        let mut steps: Vec<Step> = fragments
            .iter()
            .map(|f| Ok(StreamEvent::Fragment(f.to_string())))
            .collect();
        steps.push(Ok(StreamEvent::Done));
        self.push(Script::Replay(steps));
    }

    /// Queue a turn that streams `fragments` and then fails.
    pub fn fail_after(&self, fragments: &[&str], error: ChatError) {
        let mut steps: Vec<Step> = fragments
            .iter()
            .map(|f| Ok(StreamEvent::Fragment(f.to_string())))
            .collect();
        steps.push(Err(error));
        self.push(Script::Replay(steps));
    }

    /// Queue a turn whose request is refused before any stream exists.
    pub fn reject(&self, error: ChatError) {
        self.push(Script::Reject(error));
    }

    /// Queue a turn driven by the returned handle.
    pub fn driven(&self) -> TurnHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Script::Driven(rx));
        TurnHandle { tx }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<FragmentStream, ChatError> {
        self.requests.lock().unwrap().push(request);

        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Replay(steps)) => Ok(Box::pin(futures::stream::iter(steps))),
            Some(Script::Driven(rx)) => Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|step| (step, rx))
            }))),
            Some(Script::Reject(error)) => Err(error),
            None => Err(ChatError::Transport("no scripted reply queued".into())),
        }
    }
}

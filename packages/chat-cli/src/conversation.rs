//! Interactive conversation loop.
//!
//! Input is read line by line. Each submitted line starts a turn whose
//! events are printed as they arrive; Ctrl-C during a turn cancels it.

use std::io::Write;

use agent_chat::{ChatSession, Role, SessionEvent, SubmitOutcome};
use anyhow::{Context, Result};
use colored::Colorize;
use console::Term;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::render;

const QUIT_COMMAND: &str = "/quit";
const THINKING: &str = "thinking...";
const NOTHING_TO_SAY: &str = "(the agent had nothing to say)";
const RETRY_HINT: &str = "Your message was kept; send it again to retry.";
const CANCELLED: &str = "Reply cancelled.";

pub async fn run(session: &ChatSession, term: &Term) -> Result<()> {
    for message in session.transcript().await {
        render::print_message(&message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", ">".bright_green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(line) = line else {
            println!();
            break;
        };
        if line.trim() == QUIT_COMMAND {
            break;
        }

        // Subscribe before submitting so no event of the turn is missed
        let mut events = session.subscribe();
        session.update_input(line).await;

        match session.submit().await {
            SubmitOutcome::Accepted => follow_turn(session, &mut events, term).await?,
            SubmitOutcome::EmptyInput => continue,
            SubmitOutcome::Busy => render::print_notice("Still answering the previous message."),
        }
    }

    println!("{}", "Goodbye!".bright_blue());
    Ok(())
}

/// Print one turn until it completes, fails or is cancelled.
async fn follow_turn(
    session: &ChatSession,
    events: &mut broadcast::Receiver<SessionEvent>,
    term: &Term,
) -> Result<()> {
    let mut view = TurnView::new();
    term.write_str(&THINKING.dimmed().to_string())?;

    while !view.is_finished() {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                session.cancel().await;
                continue;
            }
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Fell behind the session's events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        for output in view.on_event(event) {
            emit(term, output)?;
        }
    }

    Ok(())
}

/// One thing to write to the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TurnOutput {
    ClearThinking,
    ReplyPrefix,
    Text(String),
    EndLine,
    Error(String),
    Notice(&'static str),
}

/// Maps one turn's session events to terminal output.
///
/// The thinking indicator stays up until the first fragment arrives.
#[derive(Debug)]
struct TurnView {
    thinking: bool,
    finished: bool,
}

impl TurnView {
    fn new() -> Self {
        Self {
            thinking: true,
            finished: false,
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn on_event(&mut self, event: SessionEvent) -> Vec<TurnOutput> {
        let mut out = Vec::new();
        if event.ends_turn() {
            self.finished = true;
        }

        match event {
            SessionEvent::TokenDelta { delta, .. } => {
                self.start_reply(&mut out);
                out.push(TurnOutput::Text(delta));
            }
            SessionEvent::GenerationComplete {
                message: Some(message),
                ..
            } => {
                // Fragments may have been missed; print the whole reply then
                if self.thinking {
                    self.start_reply(&mut out);
                    out.push(TurnOutput::Text(message.content));
                }
                out.push(TurnOutput::EndLine);
            }
            SessionEvent::GenerationComplete { message: None, .. } => {
                self.finish_line(&mut out);
                out.push(TurnOutput::Notice(NOTHING_TO_SAY));
            }
            SessionEvent::GenerationError { error, .. } => {
                self.finish_line(&mut out);
                out.push(TurnOutput::Error(error));
                out.push(TurnOutput::Notice(RETRY_HINT));
            }
            SessionEvent::GenerationCancelled { .. } => {
                self.finish_line(&mut out);
                out.push(TurnOutput::Notice(CANCELLED));
            }
            _ => {}
        }

        out
    }

    fn start_reply(&mut self, out: &mut Vec<TurnOutput>) {
        if self.thinking {
            self.thinking = false;
            out.push(TurnOutput::ClearThinking);
            out.push(TurnOutput::ReplyPrefix);
        }
    }

    /// Drop the indicator, or end a partially printed reply.
    fn finish_line(&mut self, out: &mut Vec<TurnOutput>) {
        if self.thinking {
            self.thinking = false;
            out.push(TurnOutput::ClearThinking);
        } else {
            out.push(TurnOutput::EndLine);
        }
    }
}

fn emit(term: &Term, output: TurnOutput) -> Result<()> {
    match output {
        TurnOutput::ClearThinking => term.clear_line()?,
        TurnOutput::ReplyPrefix => print!("{}> ", render::role_label(Role::Assistant)),
        TurnOutput::Text(text) => {
            print!("{}", text);
            std::io::stdout().flush()?;
        }
        TurnOutput::EndLine => println!(),
        TurnOutput::Error(error) => render::print_error(&error),
        TurnOutput::Notice(notice) => render::print_notice(notice),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_chat::testing::ScriptedBackend;
    use agent_chat::ChatError;
    use std::time::Duration;

    /// Submit `text` and collect everything the turn would print.
    async fn run_turn(session: &ChatSession, text: &str) -> Vec<TurnOutput> {
        let mut events = session.subscribe();
        session.update_input(text).await;
        assert_eq!(session.submit().await, SubmitOutcome::Accepted);

        let mut view = TurnView::new();
        let mut outputs = Vec::new();
        while !view.is_finished() {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .expect("turn never finished")
                .unwrap();
            outputs.extend(view.on_event(event));
        }
        outputs
    }

    #[tokio::test]
    async fn test_fragments_replace_thinking_indicator() {
        let backend = ScriptedBackend::new();
        backend.reply(&["Hel", "lo!"]);
        let session = ChatSession::initialize("hr", "onboarding", backend);

        let outputs = run_turn(&session, "Hi").await;
        assert_eq!(
            outputs,
            vec![
                TurnOutput::ClearThinking,
                TurnOutput::ReplyPrefix,
                TurnOutput::Text("Hel".into()),
                TurnOutput::Text("lo!".into()),
                TurnOutput::EndLine,
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_mid_reply_ends_line_then_reports() {
        let backend = ScriptedBackend::new();
        backend.fail_after(&["Par"], ChatError::Transport("connection reset".into()));
        let session = ChatSession::initialize("finance", "expenses", backend);

        let outputs = run_turn(&session, "Is this covered?").await;
        assert_eq!(
            outputs,
            vec![
                TurnOutput::ClearThinking,
                TurnOutput::ReplyPrefix,
                TurnOutput::Text("Par".into()),
                TurnOutput::EndLine,
                TurnOutput::Error("Could not reach the assistant: connection reset".into()),
                TurnOutput::Notice(RETRY_HINT),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_request_clears_indicator() {
        let backend = ScriptedBackend::new();
        backend.reject(ChatError::Incomplete);
        let session = ChatSession::initialize("legal", "contracts", backend);

        let outputs = run_turn(&session, "Draft an NDA").await;
        assert_eq!(outputs[0], TurnOutput::ClearThinking);
        assert_eq!(
            outputs[1],
            TurnOutput::Error("The response ended before it was complete".into())
        );
    }

    #[tokio::test]
    async fn test_empty_completion_prints_notice() {
        let backend = ScriptedBackend::new();
        backend.reply(&[]);
        let session = ChatSession::initialize("marketing", "leads", backend);

        let outputs = run_turn(&session, "Any leads?").await;
        assert_eq!(
            outputs,
            vec![TurnOutput::ClearThinking, TurnOutput::Notice(NOTHING_TO_SAY)]
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_reply() {
        let backend = ScriptedBackend::new();
        let turn = backend.driven();
        let session = ChatSession::initialize("hr", "performance", backend);

        let mut events = session.subscribe();
        session.update_input("Review me").await;
        session.submit().await;

        let mut view = TurnView::new();
        let mut outputs = Vec::new();
        turn.fragment("Sure");
        while !view.is_finished() {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .unwrap()
                .unwrap();
            let is_delta = matches!(event, SessionEvent::TokenDelta { .. });
            outputs.extend(view.on_event(event));
            if is_delta {
                session.cancel().await;
            }
        }

        assert_eq!(
            outputs,
            vec![
                TurnOutput::ClearThinking,
                TurnOutput::ReplyPrefix,
                TurnOutput::Text("Sure".into()),
                TurnOutput::EndLine,
                TurnOutput::Notice(CANCELLED),
            ]
        );
    }

    #[test]
    fn test_other_events_print_nothing() {
        let mut view = TurnView::new();
        let outputs = view.on_event(SessionEvent::InputChanged {
            session_id: agent_chat::SessionId::new(),
            text: "typing".into(),
        });
        assert!(outputs.is_empty());
        assert!(!view.is_finished());
    }
}

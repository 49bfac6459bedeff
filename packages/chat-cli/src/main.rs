use std::sync::Arc;

use agent_chat::{personas, ChatSession, OpenAiBackend};
use anyhow::{Context, Result};
use clap::Parser;
use completion_client::CompletionClient;
use console::Term;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod picker;
mod render;

use config::{Args, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs stay quiet so they don't interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::from_env(&args).context("Failed to load configuration")?;

    let client = CompletionClient::from_env()
        .context("Failed to configure the completion client")?
        .with_timeout(config.request_timeout);
    let backend = OpenAiBackend::new(client, config.model.clone())
        .with_temperature(config.temperature);

    let term = Term::stdout();
    let selection = picker::choose(&term, args.department, args.agent)?;

    let session = ChatSession::initialize(
        selection.department_id.as_str(),
        selection.agent_id.as_str(),
        Arc::new(backend),
    );

    let title = personas::catalogue()
        .iter()
        .find(|entry| entry.key == personas::composite_key(&selection.department_id, &selection.agent_id))
        .map(|entry| format!("{} ({})", entry.title, entry.department.label()))
        .unwrap_or_else(|| "General assistant".to_string());
    render::print_banner(&title, session.agent_context());

    conversation::run(&session, &term).await
}

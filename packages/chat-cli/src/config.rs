use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;

/// Chat with a department agent from the terminal
#[derive(Parser, Debug)]
#[command(name = "chat", version, about)]
pub struct Args {
    /// Department id (hr, finance, marketing, legal); prompts when omitted
    #[arg(short, long)]
    pub department: Option<String>,

    /// Agent id within the department; prompts when omitted
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Model name, overrides CHAT_MODEL
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Completion settings, from flags first and the environment second
#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub temperature: Option<f32>,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env(args: &Args) -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            model: args
                .model
                .clone()
                .or_else(|| env::var("CHAT_MODEL").ok())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: env::var("CHAT_TEMPERATURE")
                .ok()
                .map(|t| t.parse::<f32>())
                .transpose()
                .context("CHAT_TEMPERATURE must be a number")?,
            request_timeout: Duration::from_secs(
                env::var("CHAT_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .context("CHAT_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
        })
    }
}

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: String,
    pub api_base_url: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub request_timeout: Duration,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub session_event_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            api_base_url: env::var("CHAT_API_BASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
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
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "agent-chat".to_string()),
            session_event_capacity: env::var("SESSION_EVENT_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .context("SESSION_EVENT_CAPACITY must be a valid number")?,
        })
    }
}

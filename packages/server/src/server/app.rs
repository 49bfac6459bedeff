//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use agent_chat::{CompletionBackend, OpenAiBackend, SessionConfig};
use anyhow::Result;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post, put},
    Router,
};
use completion_client::CompletionClient;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::auth::JwtService;
use crate::domains::sessions::SessionRegistry;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::{
    cancel_handler, create_session_handler, delete_session_handler, get_session_handler,
    health_handler, list_agents_handler, stream_handler, submit_handler, update_input_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(backend: Arc<dyn CompletionBackend>, jwt_service: JwtService, session_config: SessionConfig) -> Self {
        Self {
            sessions: SessionRegistry::with_config(backend, session_config),
            jwt_service: Arc::new(jwt_service),
        }
    }

    /// Wire the OpenAI-compatible backend described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.session_event_capacity == 0 {
            anyhow::bail!("SESSION_EVENT_CAPACITY must be greater than zero");
        }

        let mut client = CompletionClient::new(config.openai_api_key.clone())
            .with_timeout(config.request_timeout);
        if let Some(base_url) = &config.api_base_url {
            client = client.with_base_url(base_url.clone());
        }

        let backend = OpenAiBackend::new(client, config.model.clone())
            .with_temperature(config.temperature);

        tracing::info!(
            model = %backend.model(),
            timeout_secs = config.request_timeout.as_secs(),
            "Completion backend configured"
        );

        Ok(Self::new(
            Arc::new(backend),
            JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
            SessionConfig {
                event_capacity: config.session_event_capacity,
            },
        ))
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - allow any origin for development
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // Clone jwt_service for middleware closure
    let jwt_service_for_middleware = state.jwt_service.clone();

    Router::new()
        // Public
        .route("/health", get(health_handler))
        .route("/api/agents", get(list_agents_handler))
        // Sessions (handlers require AuthUser)
        .route("/api/sessions", post(create_session_handler))
        .route(
            "/api/sessions/:id",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/api/sessions/:id/input", put(update_input_handler))
        .route("/api/sessions/:id/submit", post(submit_handler))
        .route("/api/sessions/:id/cancel", post(cancel_handler))
        .route("/api/sessions/:id/stream", get(stream_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service_for_middleware.clone(), req, next)
        }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

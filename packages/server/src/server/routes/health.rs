use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    active_sessions: usize,
}

/// Health check endpoint
///
/// The server holds no external connections of its own, so it is healthy
/// whenever it can answer.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_sessions: state.sessions.len().await,
    })
}

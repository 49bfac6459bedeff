//! Session endpoints.
//!
//! Every handler here takes an `AuthUser`, so anonymous requests get 401
//! before any session is touched.

use agent_chat::{SessionId, SessionSnapshot, SubmitOutcome};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub department_id: String,
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInputRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub outcome: SubmitOutcome,
    pub session: SessionSnapshot,
}

/// Session ids that don't parse can't name a session.
pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

/// POST /api/sessions
pub async fn create_session_handler(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let Json(request) = payload?;

    let session = state
        .sessions
        .create(&user.user_id, &request.department_id, &request.agent_id)
        .await;

    info!(
        session_id = %session.id(),
        user_id = %user.user_id,
        "Session opened"
    );

    Ok((StatusCode::CREATED, Json(session.snapshot().await)))
}

/// GET /api/sessions/:id
pub async fn get_session_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.sessions.get(&user.user_id, parse_session_id(&id)?).await?;
    Ok(Json(session.snapshot().await))
}

/// PUT /api/sessions/:id/input
pub async fn update_input_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateInputRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let Json(request) = payload?;
    let session = state.sessions.get(&user.user_id, parse_session_id(&id)?).await?;

    session.update_input(request.text).await;
    Ok(Json(session.snapshot().await))
}

/// POST /api/sessions/:id/submit
///
/// Rejected submissions still answer 200; the outcome says why nothing
/// happened.
pub async fn submit_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let session = state.sessions.get(&user.user_id, parse_session_id(&id)?).await?;

    let outcome = session.submit().await;
    Ok(Json(SubmitResponse {
        outcome,
        session: session.snapshot().await,
    }))
}

/// POST /api/sessions/:id/cancel
pub async fn cancel_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.sessions.get(&user.user_id, parse_session_id(&id)?).await?;

    session.cancel().await;
    Ok(Json(session.snapshot().await))
}

/// DELETE /api/sessions/:id
pub async fn delete_session_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .remove(&user.user_id, parse_session_id(&id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

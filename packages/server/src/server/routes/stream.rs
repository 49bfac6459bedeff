//! SSE streaming endpoint.
//!
//! GET /api/sessions/:id/stream?token=JWT
//!
//! Starts with a `connected` event carrying the session snapshot, then
//! forwards every `SessionEvent` named after its `type` tag. The snapshot and
//! the subscription are taken together, so no change falls between them.
//!
//! The stream holds the session open: once its last stream disconnects the
//! session is discarded.
//!
//! Auth strategy: EventSource can't send custom headers, so the JWT may be
//! passed as `?token=` (the auth middleware reads either).

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::debug;

use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;
use crate::server::routes::sessions::parse_session_id;

/// SSE stream handler.
///
/// The stream ends when the session is discarded.
pub async fn stream_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (session, viewer) = state
        .sessions
        .attach_viewer(&user.user_id, parse_session_id(&id)?)
        .await?;
    let (snapshot, rx) = session.snapshot_and_subscribe().await;

    debug!(session_id = %session.id(), user_id = %user.user_id, "Stream subscriber connected");

    let connected = Event::default()
        .event("connected")
        .json_data(&snapshot)
        .map_err(|e| ApiError::Internal(e.into()))?;
    let connected = stream::once(async move { Ok::<_, Infallible>(connected) });

    let events = BroadcastStream::new(rx).filter_map(move |result| {
        // Released when the client goes away and the stream is dropped
        let _viewer = &viewer;
        async move {
            match result {
                Ok(event) => Event::default()
                    .event(event.name())
                    .json_data(&event)
                    .ok()
                    .map(Ok),
                Err(BroadcastStreamRecvError::Lagged(n)) => Event::default()
                    .event("lagged")
                    .json_data(serde_json::json!({ "missed": n }))
                    .ok()
                    .map(Ok),
            }
        }
    });

    Ok(Sse::new(connected.chain(events)).keep_alive(KeepAlive::default()))
}

//! Shared harness for route tests.
//!
//! Builds the real router around a scripted completion backend and drives it
//! in-process with `oneshot`, so no sockets or API keys are involved.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use agent_chat::testing::ScriptedBackend;
use agent_chat::SessionConfig;
use axum::{
    body::Body,
    http::{Method, Request, Response, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use server_core::domains::auth::JwtService;
use server_core::server::{build_app, AppState};
use tower::ServiceExt;

pub struct TestHarness {
    pub app: Router,
    pub backend: Arc<ScriptedBackend>,
    pub state: AppState,
}

impl TestHarness {
    pub fn new() -> Self {
        let backend = ScriptedBackend::new();
        let state = AppState::new(
            backend.clone(),
            JwtService::new("test_secret_key", "test_issuer".to_string()),
            SessionConfig::default(),
        );

        Self {
            app: build_app(state.clone()),
            backend,
            state,
        }
    }

    pub fn token(&self, user_id: &str) -> String {
        self.state.jwt_service.create_token(user_id).unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and decode the JSON body (`Null` when empty).
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Open a session and return its id.
    pub async fn create_session(&self, token: &str, department_id: &str, agent_id: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/sessions",
                Some(token),
                Some(json!({ "department_id": department_id, "agent_id": agent_id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn set_input(&self, token: &str, id: &str, text: &str) -> Value {
        let (status, body) = self
            .json(
                Method::PUT,
                &format!("/api/sessions/{}/input", id),
                Some(token),
                Some(json!({ "text": text })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    /// Poll the session until it reports `status`.
    pub async fn wait_for_status(&self, token: &str, id: &str, status: &str) -> Value {
        let uri = format!("/api/sessions/{}", id);
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let (_, body) = self.json(Method::GET, &uri, Some(token), None).await;
                if body["status"] == status {
                    return body;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("session never reached status {}", status))
    }
}

/// Reads an SSE response body chunk by chunk.
pub struct SseReader {
    stream: axum::body::BodyDataStream,
    buffer: String,
}

impl SseReader {
    pub fn new(response: Response<Body>) -> Self {
        Self {
            stream: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next `(event name, data)` pair, skipping keep-alive comments.
    pub async fn next_event(&mut self) -> (String, Value) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(end) = self.buffer.find("\n\n") {
                    let block: String = self.buffer.drain(..end + 2).collect();
                    if let Some(event) = parse_block(&block) {
                        return event;
                    }
                    continue;
                }

                let chunk = self.stream.next().await.expect("SSE stream ended").unwrap();
                self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
            }
        })
        .await
        .expect("timed out waiting for SSE event")
    }

    /// Skip events until one named `name` arrives.
    pub async fn wait_for(&mut self, name: &str) -> Value {
        loop {
            let (event, data) = self.next_event().await;
            if event == name {
                return data;
            }
        }
    }
}

fn parse_block(block: &str) -> Option<(String, Value)> {
    let mut name = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push_str(value.trim_start());
        }
    }

    Some((name?, serde_json::from_str(&data).ok()?))
}

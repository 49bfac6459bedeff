//! Persona catalogue for agent pickers.

use agent_chat::personas::{self, Department};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DepartmentResponse {
    pub id: &'static str,
    pub label: &'static str,
    pub agents: Vec<AgentResponse>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: &'static str,
    pub key: &'static str,
    pub title: &'static str,
    pub persona: &'static str,
    pub welcome_message: String,
}

/// GET /api/agents
pub async fn list_agents_handler() -> Json<Vec<DepartmentResponse>> {
    let departments = Department::ALL
        .iter()
        .map(|department| DepartmentResponse {
            id: department.id(),
            label: department.label(),
            agents: department
                .agents()
                .map(|entry| AgentResponse {
                    id: entry.agent,
                    key: entry.key,
                    title: entry.title,
                    persona: entry.persona,
                    welcome_message: personas::welcome_message(entry.persona),
                })
                .collect(),
        })
        .collect();

    Json(departments)
}

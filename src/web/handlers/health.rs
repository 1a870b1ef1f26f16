//! # Health Check Handler

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::agents::AgentRole;
use crate::web::state::AppState;

/// Basic health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    role: AgentRole,
    agent_id: String,
    timestamp: String,
}

/// Basic health check endpoint: GET /health
pub async fn basic_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        role: state.handler.role(),
        agent_id: state.handler.agent_id().to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

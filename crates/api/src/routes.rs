//! HTTP route handlers for the API.

use crate::AppState;
use agora_common::{AgoraError, TaskPriority, TaskRequirement};
use agora_coordinator::{AgentProfile, CollaborativeResult, Negotiation, SelectionResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub agents: usize,
    pub completion_enabled: bool,
}

/// API error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Errors a handler can return.
#[derive(Debug)]
pub enum ApiError {
    Agora(AgoraError),
    BadRequest(String),
    NotFound { error: String, code: &'static str },
}

impl From<AgoraError> for ApiError {
    fn from(e: AgoraError) -> Self {
        Self::Agora(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Agora(AgoraError::NoCandidate(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Agora(AgoraError::UnknownAgent(_)) => StatusCode::NOT_FOUND,
            Self::Agora(AgoraError::ExecutionFailed { .. }) => StatusCode::BAD_GATEWAY,
            Self::Agora(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Agora(e) => {
                if status.is_server_error() {
                    error!(error = %e, code = e.code(), "Request failed");
                } else {
                    debug!(error = %e, code = e.code(), "Request rejected");
                }
                ErrorResponse {
                    error: e.to_string(),
                    code: e.code(),
                }
            }
            Self::BadRequest(error) => ErrorResponse {
                error,
                code: "INVALID_REQUEST",
            },
            Self::NotFound { error, code } => ErrorResponse { error, code },
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        agents: state.router.registered_agents().await.len(),
        completion_enabled: state.router.has_completion(),
    })
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentProfile>> {
    Json(state.router.registered_agents().await)
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// Choose an agent for a free-text task.
pub async fn route_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<SelectionResult>, ApiError> {
    if request.description.trim().is_empty() {
        return Err(ApiError::BadRequest("description must not be empty".into()));
    }
    info!(
        content_preview = %request.description.chars().take(50).collect::<String>(),
        priority = ?request.priority,
        "Received route request"
    );

    let result = state
        .router
        .route(&request.description, request.priority, request.context)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct DelegateRequest {
    pub requesting_agent: String,
    pub requirement: TaskRequirement,
}

pub async fn delegate_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DelegateRequest>,
) -> Result<Json<Negotiation>, ApiError> {
    info!(
        requesting_agent = %request.requesting_agent,
        category = %request.requirement.category,
        "Received delegation request"
    );
    let negotiation = state
        .router
        .delegate_task(&request.requesting_agent, &request.requirement)
        .await?;
    Ok(Json(negotiation))
}

pub async fn get_negotiation(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Negotiation>, ApiError> {
    debug!(task_id = %task_id, "Getting negotiation");
    state
        .router
        .get_negotiation(&task_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            error: format!("No negotiation for task '{task_id}'"),
            code: "NEGOTIATION_NOT_FOUND",
        })
}

#[derive(Debug, Deserialize)]
pub struct CollaborateRequest {
    pub primary_agent: String,
    #[serde(default)]
    pub consulting_agents: Vec<String>,
    pub requirement: TaskRequirement,
}

pub async fn collaborate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CollaborateRequest>,
) -> Result<Json<CollaborativeResult>, ApiError> {
    info!(
        primary = %request.primary_agent,
        consultants = request.consulting_agents.len(),
        "Received collaboration request"
    );
    let result = state
        .router
        .execute_collaborative_task(
            &request.primary_agent,
            &request.consulting_agents,
            &request.requirement,
        )
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    pub load_score: f32,
    pub success_rate: f32,
}

/// Overwrite an agent's load and success rate; returns the updated profile.
pub async fn update_metrics(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(request): Json<MetricsRequest>,
) -> Result<Json<AgentProfile>, ApiError> {
    state
        .router
        .update_agent_metrics(&agent_id, request.load_score, request.success_rate)
        .await?;
    match state.router.get_agent(&agent_id).await {
        Some(profile) => Ok(Json(profile)),
        None => {
            warn!(agent_id = %agent_id, "Agent disappeared after metrics update");
            Err(AgoraError::UnknownAgent(agent_id).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            uptime_seconds: 100,
            agents: 5,
            completion_enabled: false,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("\"agents\":5"));
    }

    #[test]
    fn test_route_request_defaults() {
        let request: RouteRequest =
            serde_json::from_str(r#"{"description": "Mint an NFT"}"#).unwrap();
        assert_eq!(request.description, "Mint an NFT");
        assert_eq!(request.priority, TaskPriority::Medium);
        assert!(request.context.is_empty());
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (AgoraError::NoCandidate("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AgoraError::UnknownAgent("x".into()), StatusCode::NOT_FOUND),
            (AgoraError::execution("a", "boom"), StatusCode::BAD_GATEWAY),
            (AgoraError::ExternalService("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AgoraError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::BadRequest("empty".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}

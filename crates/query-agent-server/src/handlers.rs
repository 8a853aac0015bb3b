//! HTTP Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use query_agent_core::{AgentError, ChatRequest, ChatResponse, RunContext};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: String,
    pub search_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_models: Option<Vec<String>>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a pipeline failure onto the wire error contract
pub fn error_response(err: &AgentError) -> ApiError {
    let (status, code) = match err.root() {
        AgentError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        AgentError::ToolUnavailable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "TOOL_UNAVAILABLE"),
        AgentError::BackendUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "BACKEND_UNAVAILABLE"),
        AgentError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        AgentError::ModelTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "MODEL_TIMEOUT"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
    };

    let allowed_models = match err.root() {
        AgentError::Validation { allowed, .. } if !allowed.is_empty() => Some(allowed.clone()),
        _ => None,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code,
            allowed_models,
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let factory = state.service.factory();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: factory.backend_name().to_string(),
        search_configured: factory.search_configured(),
    })
}

/// Models accepted by `/chat`
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.service.allowed_models().as_slice().to_vec(),
    })
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!("Rejected chat body: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid request: {}", rejection.body_text()),
                code: "VALIDATION_ERROR",
                allowed_models: None,
            }),
        )
    })?;

    let ctx = RunContext::new().with_parent(&state.shutdown);
    let response = state
        .service
        .handle(&request, &ctx)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(response))
}

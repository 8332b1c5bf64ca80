//! Solace HTTP REST API
//!
//! Axum server exposing the session pipeline over HTTP. Runs alongside the
//! Unix socket IPC server on port 8766 (configurable).
//!
//! Each endpoint has a thin axum handler that resolves the caller's identity
//! and delegates to an inner function. Inner functions build an IPC request,
//! route it through [`crate::router`], and map the response to a status code
//! and JSON body, so they can be tested without axum dispatch.
//!
//! Identity comes from the `x-user-id` header, falling back to
//! `[auth] demo_user_id`. A request with neither is rejected with 401.
//!
//! Endpoints:
//! - GET  /health, GET /version
//! - POST /sessions, GET /sessions, GET /sessions/:id
//! - POST /sessions/:id/messages, POST /sessions/:id/close
//! - GET  /sessions/:id/analysis, POST /sessions/:id/question, GET /sessions/:id/context
//! - GET  /goals, GET /statistics, GET /statistics/mood-trends, GET /overview

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use solace_core::config::AuthConfig;
use solace_core::ipc::{SolaceRequest, SolaceResponse};
use solace_core::models::MessageRole;

use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/sessions", post(start_session_handler).get(list_sessions_handler))
        .route("/sessions/:id", get(get_session_handler))
        .route("/sessions/:id/messages", post(append_message_handler))
        .route("/sessions/:id/close", post(close_session_handler))
        .route("/sessions/:id/analysis", get(analysis_handler))
        .route("/sessions/:id/question", post(question_handler))
        .route("/sessions/:id/context", get(context_handler))
        .route("/goals", get(goals_handler))
        .route("/statistics", get(statistics_handler))
        .route("/statistics/mood-trends", get(mood_trends_handler))
        .route("/overview", get(overview_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Solace HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct AppendMessageBody {
    pub text: Option<String>,
    pub role: Option<MessageRole>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Caller identity from the request headers, or the configured demo user.
pub fn resolve_user(headers: &HeaderMap, auth: &AuthConfig) -> std::result::Result<String, (StatusCode, Value)> {
    let from_header = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    from_header
        .or_else(|| auth.demo_user_id.clone())
        .ok_or_else(|| {
            error_body(
                StatusCode::UNAUTHORIZED,
                format!("missing {} header", USER_HEADER),
                "unauthenticated",
            )
        })
}

pub async fn health_inner(state: &AppState) -> (StatusCode, Value) {
    match state.store.health().await {
        Ok(store) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store,
                "generator": state.generator.name(),
                "socket": state.config.service.socket_path,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version, pure.
pub fn version_inner() -> Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "solace/1",
    })
}

/// Route an IPC request and map the response to HTTP.
pub async fn dispatch_inner(state: &AppState, request: SolaceRequest) -> (StatusCode, Value) {
    let response = crate::router::handle_request(request, state).await;
    let code = response.code.clone();

    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => {
            let code = code.unwrap_or_else(|| "internal".to_string());
            error_body(status_for_code(&code), e, &code)
        }
    }
}

pub async fn append_message_inner(
    state: &AppState,
    user_id: String,
    session_id: String,
    body: AppendMessageBody,
) -> (StatusCode, Value) {
    let text = match body.text {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            return error_body(StatusCode::BAD_REQUEST, "text field is required", "invalid_input");
        }
    };

    dispatch_inner(
        state,
        SolaceRequest::AppendMessage {
            user_id,
            session_id,
            text,
            role: body.role.unwrap_or_default(),
        },
    )
    .await
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

type Reply = (StatusCode, Json<Value>);

fn reply((status, body): (StatusCode, Value)) -> Reply {
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(health_inner(&state).await)
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn start_session_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::StartSession { user_id }).await)
}

pub async fn list_sessions_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::History { user_id }).await)
}

pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::GetSession { user_id, session_id }).await)
}

pub async fn append_message_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(body): Json<AppendMessageBody>,
) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(append_message_inner(&state, user_id, session_id, body).await)
}

pub async fn close_session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::CloseSession { user_id, session_id }).await)
}

pub async fn analysis_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::AnalyzeSession { user_id, session_id }).await)
}

pub async fn question_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::GenerateQuestion { user_id, session_id }).await)
}

pub async fn context_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::SessionContext { user_id, session_id }).await)
}

pub async fn goals_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::Goals { user_id }).await)
}

pub async fn statistics_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::Statistics { user_id }).await)
}

pub async fn mood_trends_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::MoodTrends { user_id }).await)
}

pub async fn overview_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match resolve_user(&headers, &state.config.auth) {
        Ok(u) => u,
        Err(rejection) => return reply(rejection),
    };
    reply(dispatch_inner(&state, SolaceRequest::Overview { user_id }).await)
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert an IPC `SolaceResponse` into an HTTP body value, or an error string.
pub fn response_to_http(response: SolaceResponse) -> std::result::Result<Value, String> {
    if response.status == "ok" {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        Err(response.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}

pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "not_found" => StatusCode::NOT_FOUND,
        "access_denied" => StatusCode::FORBIDDEN,
        "invalid_input" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(status: StatusCode, error: impl Into<String>, code: &str) -> (StatusCode, Value) {
    (
        status,
        serde_json::json!({
            "error": error.into(),
            "code": code,
            "status": "error",
        }),
    )
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

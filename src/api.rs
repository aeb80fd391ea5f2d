//! REST API Server for the UMKM assistant
//!
//! Exposes per-chat sessions over HTTP. Each chat id owns one
//! [`SessionOrchestrator`](crate::agent::SessionOrchestrator); requests on the
//! same chat id are served one at a time.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::session::SessionRegistry;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub chat_id: Option<String>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub chat_id: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionRegistry>,
}

/// =============================
/// Helpers: Chat Ids
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Chat ids may be UUIDs or any free-form client string
fn parse_chat_id(value: &str) -> Option<Uuid> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(Uuid::parse_str(value).unwrap_or_else(|_| stable_uuid_from_string(value)))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "sessions": state.sessions.len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    // Sessions keep their own history, so only the newest user turn is used
    let Some(user_msg) = req.messages.iter().rev().find(|m| m.role == "user") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No user message found".into())),
        );
    };

    let chat_id = req
        .chat_id
        .as_deref()
        .and_then(parse_chat_id)
        .unwrap_or_else(Uuid::new_v4);

    info!(chat_id = %chat_id, "Received chat message");

    let session = state.sessions.get_or_create(chat_id).await;
    let dispatch = session.lock().await.dispatch_detailed(&user_msg.content).await;

    let Some(dispatch) = dispatch else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message is empty".into())),
        );
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "type": dispatch.classification,
            "answer": dispatch.answer,
            "chat_id": chat_id.to_string(),
        }))),
    )
}

/// =============================
/// Session Endpoints
/// =============================

async fn reset_handler(
    State(state): State<ApiState>,
    Json(req): Json<ResetRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(chat_id) = parse_chat_id(&req.chat_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("chat_id is required".into())),
        );
    };

    match state.sessions.reset(chat_id).await {
        Ok(()) => {
            info!(chat_id = %chat_id, "Chat reset");
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "chat_id": chat_id.to_string(),
                    "reset": true,
                }))),
            )
        }
        Err(e) => (StatusCode::NOT_FOUND, Json(ApiResponse::error(e.to_string()))),
    }
}

async fn memory_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let session = match parse_chat_id(&chat_id) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };

    match session {
        Some(session) => {
            let snapshot = session.lock().await.snapshot();
            (StatusCode::OK, Json(ApiResponse::success(snapshot)))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown chat: {}", chat_id))),
        ),
    }
}

async fn delete_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let removed = match parse_chat_id(&chat_id) {
        Some(id) => state.sessions.remove(id).await,
        None => false,
    };

    if removed {
        (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "chat_id": chat_id,
                "deleted": true,
            }))),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown chat: {}", chat_id))),
        )
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(sessions: Arc<SessionRegistry>) -> Router {
    let state = ApiState { sessions };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/reset", post(reset_handler))
        .route("/api/chat/:chat_id", delete(delete_handler))
        .route("/api/chat/:chat_id/memory", get(memory_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    sessions: Arc<SessionRegistry>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(sessions);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

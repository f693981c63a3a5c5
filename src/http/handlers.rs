use super::state::AppState;
use crate::call::{CallSession, DialInfo};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    /// E.164 number to dial, optionally with a `,extension` suffix
    pub phone_number: String,

    /// Optional call ID (if not provided, generate UUID)
    pub call_id: Option<String>,

    /// Optional transfer target for human handoff
    pub transfer_to: Option<String>,

    /// Opaque account context passed through to the call artifact
    pub account: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub call_id: String,
    pub room: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EndCallResponse {
    pub call_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /calls
/// Start a new outbound call
pub async fn start_call(
    State(state): State<AppState>,
    Json(req): Json<StartCallRequest>,
) -> impl IntoResponse {
    if req.phone_number.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "phone_number must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    // Generate or use provided call ID
    let call_id = req
        .call_id
        .unwrap_or_else(|| format!("call-{}", uuid::Uuid::new_v4()));

    info!("Starting outbound call: {}", call_id);

    // Check if already active
    if state.registry.contains(&call_id).await {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Call {} is already active", call_id),
            }),
        )
            .into_response();
    }

    let room = format!("room-{}", call_id);
    if let Err(e) = state.ctx.platform.create_room(&room).await {
        error!("Failed to create room: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to create room: {}", e),
            }),
        )
            .into_response();
    }

    let dial = DialInfo {
        phone_number: req.phone_number,
        transfer_to: req.transfer_to,
        account: req.account.unwrap_or(serde_json::Value::Null),
    };

    let session = CallSession::launch(state.ctx.clone(), call_id.clone(), room.clone(), dial);
    state.registry.insert(call_id.clone(), session.clone()).await;

    // Evict the session from the registry once it finishes on its own.
    let registry = state.registry.clone();
    let evict_id = call_id.clone();
    tokio::spawn(async move {
        session.wait().await;
        registry.remove(&evict_id).await;
    });

    info!("Call launched: {}", call_id);

    (
        StatusCode::OK,
        Json(StartCallResponse {
            call_id: call_id.clone(),
            room,
            status: "dialing".to_string(),
            message: format!("Outbound call {} launched", call_id),
        }),
    )
        .into_response()
}

/// POST /calls/:call_id/end
/// End an active call early
pub async fn end_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    info!("Ending call: {}", call_id);

    match state.registry.get(&call_id).await {
        Some(session) => {
            session.end().await;
            (
                StatusCode::OK,
                Json(EndCallResponse {
                    call_id: call_id.clone(),
                    status: "ending".to_string(),
                    message: "Call end requested".to_string(),
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Call {} not found", call_id),
            }),
        )
            .into_response(),
    }
}

/// GET /calls/:call_id
/// Get status of an active call
pub async fn get_call_status(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&call_id).await {
        Some(session) => {
            let status = session.status().await;
            (StatusCode::OK, Json(status)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Call {} not found", call_id),
            }),
        )
            .into_response(),
    }
}

/// GET /calls/:call_id/disposition
/// Get the current disposition snapshot for an active call
pub async fn get_call_disposition(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&call_id).await {
        Some(session) => {
            let snapshot = session.snapshot().await;
            (StatusCode::OK, Json(snapshot)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Call {} not found", call_id),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

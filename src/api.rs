//! HTTP API endpoints for session management.
//!
//! Clients create a session here, then connect to `/ws/{session_id}`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SyncError;
use crate::state::AppState;
use crate::types::SessionId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Create a new empty session.
///
/// GET|POST /new-session
pub async fn create_session(State(state): State<Arc<AppState>>) -> Response {
    match state.create_session().await {
        Ok(session) => Json(NewSessionResponse {
            session_id: session.id,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to create session: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Current snapshot of a session.
///
/// GET /session/{session_id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Response {
    match state.session_view(&session_id).await {
        Ok(view) => Json(view).into_response(),
        Err(SyncError::SessionNotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Session not found")
        }
        Err(e) => {
            tracing::error!("Failed to read session {}: {}", session_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

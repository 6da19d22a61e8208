//! WebSocket message dispatch
//!
//! Entry point of the command processor. Events are validated here and
//! dispatched to the participant and round handler modules; every state
//! change goes through the session store and is followed by a broadcast.

use crate::error::SyncError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::Connection;
use crate::state::AppState;
use std::sync::Arc;

use super::{participant, round};

/// Handle a client message and return an optional reply for the sender only
pub async fn handle_message(
    msg: ClientMessage,
    conn: &Arc<Connection>,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let event = msg.event_type();
    let result = match msg {
        // Round control
        ClientMessage::GetState => round::handle_get_state(state, conn).await,
        ClientMessage::Reveal => round::handle_reveal(state, conn).await,
        ClientMessage::ClearVotes => round::handle_clear_votes(state, conn).await,
        ClientMessage::HideVotes => round::handle_hide_votes(state, conn).await,

        // Participant events
        ClientMessage::Join { name } => match required_name(event, name) {
            Ok(name) => participant::handle_join(state, conn, name).await,
            Err(e) => Err(e),
        },
        ClientMessage::Vote { name, value } => match required_name(event, name) {
            Ok(name) => participant::handle_vote(state, conn, name, value).await,
            Err(e) => Err(e),
        },
        ClientMessage::Disconnected { name } => match required_name(event, name) {
            Ok(name) => participant::handle_disconnected(state, conn, name).await,
            Err(e) => Err(e),
        },
        ClientMessage::RemoveUser { name } => match required_name(event, name) {
            Ok(name) => participant::handle_remove_user(state, conn, name).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => None,
        Err(e) => error_reply(conn, event, e),
    }
}

/// Extract a non-blank participant name, trimmed
pub fn required_name(event: &'static str, name: Option<String>) -> Result<String, SyncError> {
    match name.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_string()),
        _ => Err(SyncError::MalformedEvent {
            event,
            field: "name",
        }),
    }
}

fn error_reply(conn: &Connection, event: &str, err: SyncError) -> Option<ServerMessage> {
    match err {
        SyncError::SessionNotFound(_) => {
            tracing::info!("{} on {}: session {} is gone", event, conn.id, conn.session_id);
            Some(ServerMessage::no_session())
        }
        SyncError::MalformedEvent { .. } | SyncError::Parse(_) => {
            tracing::warn!("Dropping event on {}: {}", conn.id, err);
            None
        }
        SyncError::StoreUnavailable(_) => {
            tracing::error!("{} failed on {}: {}", event, conn.id, err);
            Some(ServerMessage::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            })
        }
    }
}

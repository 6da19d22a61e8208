pub mod handlers;
mod participant;
mod round;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::error::SyncError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::Connection;
use crate::state::AppState;
use crate::types::SessionId;

/// WebSocket upgrade handler for `/ws/{session_id}`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request for session {}", session_id);
    ws.on_upgrade(move |socket| handle_socket(socket, Some(session_id), state))
}

/// WebSocket upgrade handler for a bare `/ws` with no session in the path
pub async fn ws_handler_without_session(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request without a session id");
    ws.on_upgrade(move |socket| handle_socket(socket, None, state))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Check the session a socket asked for. `None` for a missing, blank or
/// unknown id, or when the store cannot answer.
pub async fn resolve_session(state: &AppState, session_id: Option<SessionId>) -> Option<SessionId> {
    let id = session_id.filter(|id| !id.trim().is_empty())?;
    match state.session_exists(&id).await {
        Ok(true) => Some(id),
        Ok(false) => None,
        Err(e) => {
            tracing::error!("Failed to look up session {}: {}", id, e);
            None
        }
    }
}

/// Parse an inbound text frame. Invalid frames are logged and dropped; the
/// connection stays open.
pub fn parse_frame(connection_id: &str, text: &str) -> Option<ClientMessage> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            let err = SyncError::from(e);
            tracing::warn!("Dropping message on {}: {}", connection_id, err);
            None
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, session_id: Option<SessionId>, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Validate the target session before anything is registered or mutated
    let Some(session_id) = resolve_session(&state, session_id).await else {
        tracing::info!("Rejecting WebSocket: session not found");
        send_json(&mut sender, &ServerMessage::no_session()).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    let (conn, mut outbound) =
        Connection::new(session_id.clone(), state.config.outbound_buffer);
    state.registry.register(conn.clone()).await;
    tracing::info!(
        "WebSocket {} connected to session {} ({} live)",
        conn.id,
        session_id,
        state.registry.connection_count()
    );

    loop {
        tokio::select! {
            // Queued broadcasts for this connection
            queued = outbound.recv() => {
                let Some(json) = queued else { break };
                let text = String::from(json.as_str());
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            _ = conn.close_requested() => {
                tracing::warn!("Closing connection {} on server request", conn.id);
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message on {}: {}", conn.id, text.as_str());

                        let Some(client_msg) = parse_frame(&conn.id, text.as_str()) else {
                            continue;
                        };

                        let reply = handlers::handle_message(client_msg, &conn, &state).await;
                        if let Some(response) = reply {
                            let terminal = matches!(response, ServerMessage::NoSessionError { .. });
                            if !send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response on {}", conn.id);
                                break;
                            }
                            if terminal {
                                let _ = sender.send(Message::Close(None)).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket {} closed by client", conn.id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error on {}: {}", conn.id, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let outcome = state.handle_disconnect(&conn.id).await;
    tracing::info!("WebSocket {} closed ({:?})", conn.id, outcome);
}

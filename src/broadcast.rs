use std::sync::Arc;

use crate::protocol::{ServerMessage, SessionView};
use crate::registry::ConnectionRegistry;
use crate::types::ParticipantName;

/// Fans messages out to every connection bound to a session.
///
/// Each message is serialized once and queued on every recipient without
/// waiting, so a slow client cannot hold up the rest of the fan-out.
///
/// A dropped `state` is repaired by the next snapshot. A dropped
/// `user_removed` is not, so a connection that misses one is closed and has
/// to reconnect and resync.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    max_send_drops: u64,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, max_send_drops: u64) -> Self {
        Self {
            registry,
            max_send_drops,
        }
    }

    /// Push a full state snapshot to the session
    pub async fn publish_state(&self, session_id: &str, view: &SessionView) -> usize {
        self.broadcast_to_session(
            session_id,
            &ServerMessage::State {
                state: view.clone(),
            },
        )
        .await
    }

    /// Announce a removal. Connections that cannot take it are closed.
    pub async fn notify_user_removed(&self, session_id: &str, name: &ParticipantName) -> usize {
        let msg = ServerMessage::UserRemoved { name: name.clone() };
        self.fan_out(session_id, &msg, true).await
    }

    /// Serialize and queue a message on every connection of the session.
    /// Returns how many connections accepted it.
    pub async fn broadcast_to_session(&self, session_id: &str, msg: &ServerMessage) -> usize {
        self.fan_out(session_id, msg, false).await
    }

    async fn fan_out(&self, session_id: &str, msg: &ServerMessage, must_deliver: bool) -> usize {
        let json = match serde_json::to_string(msg) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                tracing::error!("Failed to serialize message for session {}: {}", session_id, e);
                return 0;
            }
        };

        let mut delivered = 0;
        let recipients = self.registry.session_connections(session_id).await;
        for conn in &recipients {
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
                continue;
            }

            let drops = conn.drop_count();
            if must_deliver {
                tracing::warn!(
                    "Closing connection {} in session {}: undeliverable {:?}",
                    conn.id,
                    session_id,
                    msg
                );
                conn.request_close();
            } else if drops >= self.max_send_drops {
                tracing::warn!(
                    "Closing slow connection {} in session {} after {} dropped messages",
                    conn.id,
                    session_id,
                    drops
                );
                conn.request_close();
            } else {
                tracing::warn!(
                    "Outbound queue full for connection {} in session {} (drops: {})",
                    conn.id,
                    session_id,
                    drops
                );
            }
        }

        tracing::debug!(
            "Broadcast to session {}: {}/{} connections",
            session_id,
            delivered,
            recipients.len()
        );
        delivered
    }
}

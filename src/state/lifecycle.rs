//! Session Lifecycle Manager
//!
//! Disconnect policy: a participant leaves the session together with their
//! vote as soon as the last connection claiming their name closes. A session
//! is reclaimed once it has no participants and no connections left.

use super::AppState;
use crate::error::SyncError;
use crate::protocol::SessionView;
use crate::store::Mutation;
use chrono::Utc;
use std::sync::Arc;

/// What happened to the session when a connection closed
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectOutcome {
    /// Connection was not registered (already cleaned up)
    Unknown,
    /// Session still has members or viewers; the new state was published
    Kept,
    /// Session was empty and abandoned, so it was deleted
    Reclaimed,
    /// Session no longer exists
    Gone,
}

impl AppState {
    /// Transport close handler. Unregisters the connection right away, then
    /// removes its participant and reclaims the session when abandoned.
    pub async fn handle_disconnect(&self, connection_id: &str) -> DisconnectOutcome {
        let Some(conn) = self.registry.unregister(connection_id).await else {
            return DisconnectOutcome::Unknown;
        };
        let session_id = conn.session_id.as_str();
        tracing::info!("Connection {} left session {}", conn.id, session_id);

        let lock = self.session_lock(session_id);
        let guard = lock.lock().await;

        // Every name joined through this connection leaves with it
        let mut removed = false;
        for name in conn.claimed_names() {
            if self.registry.is_claimed(session_id, &name).await {
                tracing::debug!("{} is still connected elsewhere in {}", name, session_id);
                continue;
            }
            let mutation = Mutation::RemoveParticipant { name: name.clone() };
            match self
                .store_call(self.store.apply(session_id, mutation))
                .await
            {
                Ok(_) => {
                    tracing::info!("{} disconnected from session {}", name, session_id);
                    removed = true;
                }
                Err(SyncError::SessionNotFound(_)) => return DisconnectOutcome::Gone,
                Err(e) => tracing::error!(
                    "Failed to remove {} from session {} on disconnect: {}",
                    name,
                    session_id,
                    e
                ),
            }
        }

        // Read the post-mutation state, still under the session lock
        if self.registry.session_connection_count(session_id).await == 0 {
            match self.store_call(self.store.delete_if_empty(session_id)).await {
                Ok(true) => {
                    drop(guard);
                    self.forget_session_lock(session_id);
                    tracing::info!("Reclaimed empty session {}", session_id);
                    return DisconnectOutcome::Reclaimed;
                }
                Ok(false) => {}
                Err(SyncError::SessionNotFound(_)) => return DisconnectOutcome::Gone,
                Err(e) => {
                    tracing::error!("Failed to reclaim session {}: {}", session_id, e);
                }
            }
        }

        if removed {
            match self.store_call(self.store.get_session(session_id)).await {
                Ok(session) => {
                    self.broadcaster
                        .publish_state(session_id, &SessionView::from(&session))
                        .await;
                }
                Err(SyncError::SessionNotFound(_)) => return DisconnectOutcome::Gone,
                Err(e) => tracing::error!("Failed to read session {}: {}", session_id, e),
            }
        }
        DisconnectOutcome::Kept
    }

    /// Delete sessions with no connections whose last activity is older than
    /// the configured idle TTL. Returns how many were deleted.
    pub async fn reap_idle_sessions(&self) -> usize {
        let ids = match self.store_call(self.store.session_ids()).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Session reaper could not list sessions: {}", e);
                return 0;
            }
        };

        let ttl = self.config.session_idle_ttl;
        let mut reaped = 0;

        for id in ids {
            if self.registry.session_connection_count(&id).await > 0 {
                continue;
            }

            let lock = self.session_lock(&id);
            let guard = lock.lock().await;

            // Re-check under the lock; someone may have connected meanwhile
            if self.registry.session_connection_count(&id).await > 0 {
                continue;
            }
            let session = match self.store_call(self.store.get_session(&id)).await {
                Ok(session) => session,
                Err(_) => continue,
            };
            let idle_for = (Utc::now() - session.last_activity)
                .to_std()
                .unwrap_or_default();
            if idle_for < ttl {
                continue;
            }

            match self.store_call(self.store.delete_session(&id)).await {
                Ok(true) => {
                    drop(guard);
                    self.forget_session_lock(&id);
                    tracing::info!(
                        "Reaped idle session {} ({} participants)",
                        id,
                        session.participants.len()
                    );
                    reaped += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to reap session {}: {}", id, e),
            }
        }
        reaped
    }
}

/// Spawn a background task that periodically reclaims idle sessions
pub fn spawn_session_reaper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.reaper_interval);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let reaped = state.reap_idle_sessions().await;
            if reaped > 0 {
                tracing::debug!("Session reaper removed {} sessions", reaped);
            }
        }
    })
}

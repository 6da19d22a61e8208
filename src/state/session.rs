use super::AppState;
use crate::error::SyncError;
use crate::protocol::SessionView;
use crate::registry::Connection;
use crate::store::Mutation;
use crate::types::*;

impl AppState {
    /// Allocate a new empty session
    pub async fn create_session(&self) -> Result<Session, SyncError> {
        let session = self.store_call(self.store.create_session()).await?;
        tracing::info!("Created session {}", session.id);
        Ok(session)
    }

    /// Current projected snapshot of a session
    pub async fn session_view(&self, session_id: &str) -> Result<SessionView, SyncError> {
        let session = self.store_call(self.store.get_session(session_id)).await?;
        Ok(SessionView::from(&session))
    }

    pub async fn session_exists(&self, session_id: &str) -> Result<bool, SyncError> {
        match self.store_call(self.store.get_session(session_id)).await {
            Ok(_) => Ok(true),
            Err(SyncError::SessionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read the canonical state and push it to every connection of the session
    pub async fn publish_state(&self, session_id: &str) -> Result<SessionView, SyncError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.store_call(self.store.get_session(session_id)).await?;
        let view = SessionView::from(&session);
        self.broadcaster.publish_state(session_id, &view).await;
        Ok(view)
    }

    /// Apply one mutation and broadcast the resulting snapshot as a single
    /// unit with respect to other mutations of the same session
    pub async fn apply_and_publish(
        &self,
        session_id: &str,
        mutation: Mutation,
    ) -> Result<SessionView, SyncError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let kind = mutation.kind();
        let session = self
            .store_call(self.store.apply(session_id, mutation))
            .await?;
        tracing::debug!("Applied {} to session {}", kind, session_id);

        let view = SessionView::from(&session);
        self.broadcaster.publish_state(session_id, &view).await;
        Ok(view)
    }

    /// Join the connection's session as `name` and bind the name to the
    /// connection. Rejoining an existing name keeps its suit and vote.
    pub async fn join(&self, conn: &Connection, name: &str) -> Result<SessionView, SyncError> {
        let session_id = conn.session_id.as_str();
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self
            .store_call(self.store.apply(
                session_id,
                Mutation::Join {
                    name: name.to_string(),
                },
            ))
            .await?;
        conn.bind_participant(name);
        tracing::info!("{} joined session {} ({})", name, session_id, conn.id);

        let view = SessionView::from(&session);
        self.broadcaster.publish_state(session_id, &view).await;
        Ok(view)
    }

    /// Remove a participant and their vote.
    ///
    /// Every connection of the session (the removed participant's included)
    /// gets `user_removed` before the snapshot that no longer lists the name.
    /// Returns false when the name was not a participant.
    pub async fn remove_participant(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<bool, SyncError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.store_call(self.store.get_session(session_id)).await?;
        if session.participant(name).is_none() {
            tracing::debug!("remove_user for unknown participant {} in {}", name, session_id);
            return Ok(false);
        }

        let session = self
            .store_call(self.store.apply(
                session_id,
                Mutation::RemoveParticipant {
                    name: name.to_string(),
                },
            ))
            .await?;
        tracing::info!("Removed {} from session {}", name, session_id);
        // A removed name no longer belongs to any connection
        self.registry.release_name(session_id, name).await;

        self.broadcaster
            .notify_user_removed(session_id, &name.to_string())
            .await;
        self.broadcaster
            .publish_state(session_id, &SessionView::from(&session))
            .await;
        Ok(true)
    }
}

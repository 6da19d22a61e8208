//! Participant message handlers: join, vote, leave and removal

use crate::error::SyncError;
use crate::registry::Connection;
use crate::state::AppState;
use crate::store::Mutation;
use std::sync::Arc;

pub async fn handle_join(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
    name: String,
) -> Result<(), SyncError> {
    state.join(conn, &name).await?;
    Ok(())
}

/// Record a vote. A missing value counts as an empty vote.
pub async fn handle_vote(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
    name: String,
    value: Option<String>,
) -> Result<(), SyncError> {
    let value = value.unwrap_or_default();
    tracing::debug!("Vote from {} in session {}", name, conn.session_id);
    state
        .apply_and_publish(&conn.session_id, Mutation::CastVote { name, value })
        .await?;
    Ok(())
}

/// Client announced it is leaving; keep the seat but show it offline
pub async fn handle_disconnected(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
    name: String,
) -> Result<(), SyncError> {
    tracing::info!("{} went offline in session {}", name, conn.session_id);
    state
        .apply_and_publish(
            &conn.session_id,
            Mutation::SetOnline {
                name,
                online: false,
            },
        )
        .await?;
    Ok(())
}

pub async fn handle_remove_user(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
    name: String,
) -> Result<(), SyncError> {
    tracing::info!("Removal of {} requested by {}", name, conn.id);
    state.remove_participant(&conn.session_id, &name).await?;
    Ok(())
}

//! Round control handlers. Any connection of the session may drive these.

use crate::error::SyncError;
use crate::registry::Connection;
use crate::state::AppState;
use crate::store::Mutation;
use std::sync::Arc;

/// Republish the current snapshot to the whole session
pub async fn handle_get_state(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
) -> Result<(), SyncError> {
    state.publish_state(&conn.session_id).await?;
    Ok(())
}

pub async fn handle_reveal(state: &Arc<AppState>, conn: &Arc<Connection>) -> Result<(), SyncError> {
    tracing::info!("Revealing votes in session {}", conn.session_id);
    round_mutation(state, conn, Mutation::Reveal).await
}

/// Start a new round
pub async fn handle_clear_votes(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
) -> Result<(), SyncError> {
    tracing::info!("Clearing votes in session {}", conn.session_id);
    round_mutation(state, conn, Mutation::ClearVotes).await
}

pub async fn handle_hide_votes(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
) -> Result<(), SyncError> {
    round_mutation(state, conn, Mutation::HideVotes).await
}

async fn round_mutation(
    state: &Arc<AppState>,
    conn: &Connection,
    mutation: Mutation,
) -> Result<(), SyncError> {
    state.apply_and_publish(&conn.session_id, mutation).await?;
    Ok(())
}

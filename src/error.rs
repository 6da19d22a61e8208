//! Error taxonomy of the synchronization engine.

use crate::store::StoreError;
use crate::types::SessionId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Terminal for the connection: notify, then close
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// A required field is missing; dropped without telling anyone
    #[error("malformed {event} event: missing {field}")]
    MalformedEvent {
        event: &'static str,
        field: &'static str,
    },

    /// Reported to the originating connection only; session state is unchanged
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// Inbound frame is not a valid envelope; dropped, connection stays open
    #[error("invalid message: {0}")]
    Parse(String),
}

impl SyncError {
    /// Wire code sent in `error` messages
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            SyncError::MalformedEvent { .. } => "MALFORMED_EVENT",
            SyncError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            SyncError::Parse(_) => "PARSE_ERROR",
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SyncError::SessionNotFound(id),
            other => SyncError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

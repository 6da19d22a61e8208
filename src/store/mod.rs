mod memory;
mod mutation;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{Session, SessionId};

pub use memory::InMemorySessionStore;
pub use mutation::Mutation;

/// Result type for session store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a session store can report
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Contract every session backing store must satisfy.
///
/// `apply` must be atomic per session: the returned session is the state
/// right after the mutation, and no reader may observe a partially applied
/// mutation. Backends may be in-memory or durable; callers bound every call
/// with a timeout, so a durable backend is free to block or suspend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate a new empty session with a fresh identifier
    async fn create_session(&self) -> StoreResult<Session>;

    async fn get_session(&self, id: &str) -> StoreResult<Session>;

    /// Apply one mutation and return the resulting canonical state
    async fn apply(&self, id: &str, mutation: Mutation) -> StoreResult<Session>;

    /// Delete the session only if it has no participants and no votes.
    /// Returns whether it was deleted.
    async fn delete_if_empty(&self, id: &str) -> StoreResult<bool>;

    /// Delete the session unconditionally. Returns whether it existed.
    async fn delete_session(&self, id: &str) -> StoreResult<bool>;

    async fn session_ids(&self) -> StoreResult<Vec<SessionId>>;

    /// Get the name of this backend
    fn name(&self) -> &str;
}

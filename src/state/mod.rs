mod lifecycle;
mod session;

pub use lifecycle::{spawn_session_reaper, DisconnectOutcome};

use crate::broadcast::Broadcaster;
use crate::config::EngineConfig;
use crate::error::SyncError;
use crate::registry::ConnectionRegistry;
use crate::store::{InMemorySessionStore, SessionStore, StoreError, StoreResult};
use crate::types::SessionId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, Weak};
use tokio::sync::Mutex;

/// Prune dead lock entries once the map grows past this size
const LOCK_PRUNE_THRESHOLD: usize = 128;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub config: EngineConfig,
    /// One exclusive-access point per session. Every mutation and the
    /// broadcast that follows it run while holding the session's lock.
    session_locks: std::sync::Mutex<HashMap<SessionId, Weak<Mutex<()>>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>, config: EngineConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            store,
            broadcaster: Broadcaster::new(registry.clone(), config.max_send_drops),
            registry,
            config,
            session_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// In-memory store with default engine settings
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemorySessionStore::new()),
            EngineConfig::default(),
        )
    }

    /// Get (or create) the serialization lock of a session
    pub(crate) fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if locks.len() > LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(session_id).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    pub(crate) fn forget_session_lock(&self, session_id: &str) {
        self.session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }

    /// Run a store call bounded by the configured timeout
    pub(crate) async fn store_call<T>(
        &self,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, SyncError> {
        let timeout = self.config.store_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => {
                tracing::error!("Session store ({}) call timed out", self.store.name());
                Err(StoreError::Timeout(timeout).into())
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}

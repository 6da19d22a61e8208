//! Connection Registry: every live socket, the session it targets and the
//! participant names it joined as.
//!
//! The registry only indexes connections for fan-out; participant and vote
//! data stay owned by the session store.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use tokio::sync::{mpsc, Notify, RwLock};

use crate::types::*;

/// One live transport connection bound to a session
pub struct Connection {
    pub id: ConnectionId,
    pub session_id: SessionId,
    /// Every name joined through this connection and not yet removed
    claimed: StdRwLock<BTreeSet<ParticipantName>>,
    tx: mpsc::Sender<Arc<String>>,
    drops: AtomicU64,
    close: Notify,
}

impl Connection {
    /// Create a connection and the receiving half of its outbound queue
    pub fn new(
        session_id: SessionId,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let conn = Self {
            id: ulid::Ulid::new().to_string(),
            session_id,
            claimed: StdRwLock::new(BTreeSet::new()),
            tx,
            drops: AtomicU64::new(0),
            close: Notify::new(),
        };
        (Arc::new(conn), rx)
    }

    /// Names this connection has joined as
    pub fn claimed_names(&self) -> Vec<ParticipantName> {
        self.claimed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn claims(&self, name: &str) -> bool {
        self.claimed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Record that this connection joined as `name`. Joining under another
    /// name later adds to the claims instead of replacing them.
    pub fn bind_participant(&self, name: &str) {
        self.claimed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    /// Drop the claim on `name`. Returns whether it was held.
    pub fn release_participant(&self, name: &str) -> bool {
        self.claimed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Queue a serialized message without waiting. Returns false when the
    /// queue is full or the socket task is gone.
    pub fn send(&self, json: Arc<String>) -> bool {
        match self.tx.try_send(json) {
            Ok(()) => true,
            Err(_) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Ask the socket task to shut this connection down
    pub fn request_close(&self) {
        self.close.notify_one();
    }

    /// Resolves once `request_close` has been called
    pub async fn close_requested(&self) {
        self.close.notified().await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("claimed", &self.claimed_names())
            .finish()
    }
}

/// All live connections, indexed by connection ID
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    active_count: AtomicUsize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection: Arc<Connection>) {
        let mut conns = self.connections.write().await;
        if conns.insert(connection.id.clone(), connection).is_none() {
            self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection, returning it if it was registered
    pub async fn unregister(&self, connection_id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.write().await.remove(connection_id);
        if removed.is_some() {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Connections bound to a session, joined or not
    pub async fn session_connections(&self, session_id: &str) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.session_id == session_id)
            .cloned()
            .collect()
    }

    pub async fn session_connection_count(&self, session_id: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.session_id == session_id)
            .count()
    }

    /// Whether any live connection of the session is bound to `name`
    pub async fn is_claimed(&self, session_id: &str, name: &str) -> bool {
        self.connections
            .read()
            .await
            .values()
            .any(|c| c.session_id == session_id && c.claims(name))
    }

    /// Clear `name` from every connection of the session that claims it.
    /// Returns how many claims were released.
    pub async fn release_name(&self, session_id: &str, name: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.session_id == session_id)
            .filter(|c| c.release_participant(name))
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

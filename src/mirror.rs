//! Client-side mirror of a session.
//!
//! Every `state` message replaces the local copy wholesale, so a client that
//! missed messages converges on the next snapshot. Subscribers are woken on
//! each change through a `watch` channel.

use tokio::sync::watch;

use crate::error::SyncError;
use crate::protocol::{ServerMessage, SessionView};
use crate::types::ParticipantName;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorState {
    pub view: SessionView,
    /// Set when `user_removed` named this client
    pub removed: bool,
    /// Set when the server reported that the session does not exist
    pub session_missing: bool,
    pub last_error: Option<String>,
}

pub struct SessionMirror {
    own_name: Option<ParticipantName>,
    tx: watch::Sender<MirrorState>,
}

impl SessionMirror {
    pub fn new(own_name: Option<ParticipantName>) -> Self {
        let (tx, _rx) = watch::channel(MirrorState::default());
        Self { own_name, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<MirrorState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> MirrorState {
        self.tx.borrow().clone()
    }

    /// Parse and apply one raw frame from the server
    pub fn apply_json(&self, text: &str) -> Result<(), SyncError> {
        let msg: ServerMessage = serde_json::from_str(text)?;
        self.apply(msg);
        Ok(())
    }

    pub fn apply(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::State { state } => self.tx.send_modify(|mirror| {
                mirror.view = state;
                mirror.last_error = None;
            }),
            ServerMessage::UserRemoved { name } => {
                if self.own_name.as_deref() == Some(name.as_str()) {
                    tracing::info!("This client ({}) was removed from the session", name);
                    self.tx.send_modify(|mirror| mirror.removed = true);
                }
            }
            ServerMessage::NoSessionError { message } => self.tx.send_modify(|mirror| {
                mirror.session_missing = true;
                mirror.last_error = Some(message);
            }),
            ServerMessage::Error { code, message } => {
                tracing::warn!("Server error {}: {}", code, message);
                self.tx
                    .send_modify(|mirror| mirror.last_error = Some(message));
            }
        }
    }
}

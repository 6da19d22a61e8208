use crate::types::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Inbound envelope: `{ "type": ..., "name"?: ..., "value"?: ... }`.
///
/// Fields a variant needs are still optional here; a missing field is a
/// malformed event that the command processor drops, not a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    GetState,
    Join {
        #[serde(default)]
        name: Option<String>,
    },
    Vote {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        value: Option<String>,
    },
    Reveal,
    ClearVotes,
    HideVotes,
    /// Sent by a client that is going away (e.g. page unload)
    Disconnected {
        #[serde(default)]
        name: Option<String>,
    },
    RemoveUser {
        #[serde(default)]
        name: Option<String>,
    },
}

impl ClientMessage {
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientMessage::GetState => "get_state",
            ClientMessage::Join { .. } => "join",
            ClientMessage::Vote { .. } => "vote",
            ClientMessage::Reveal => "reveal",
            ClientMessage::ClearVotes => "clear_votes",
            ClientMessage::HideVotes => "hide_votes",
            ClientMessage::Disconnected { .. } => "disconnected",
            ClientMessage::RemoveUser { .. } => "remove_user",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot of the session, never a delta
    State { state: SessionView },
    UserRemoved { name: ParticipantName },
    NoSessionError { message: String },
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn no_session() -> Self {
        ServerMessage::NoSessionError {
            message: "Session not found".to_string(),
        }
    }
}

/// Participant as seen by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantView {
    pub suit: Suit,
    pub online: bool,
}

/// Participant-facing projection of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub users: BTreeMap<ParticipantName, ParticipantView>,
    pub votes: BTreeMap<ParticipantName, String>,
    pub votes_revealed: bool,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            users: session
                .participants
                .iter()
                .map(|(name, p)| {
                    (
                        name.clone(),
                        ParticipantView {
                            suit: p.suit,
                            online: p.online,
                        },
                    )
                })
                .collect(),
            votes: session.votes.clone(),
            votes_revealed: session.votes_revealed,
        }
    }
}

/// Ordering rank of a vote: missing or blank first, then numbers ascending,
/// then anything non-numeric such as "?"
fn vote_rank(vote: Option<&str>) -> (u8, f64) {
    match vote.map(str::trim) {
        None | Some("") => (0, 0.0),
        Some(v) => match v.parse::<f64>() {
            Ok(n) => (1, n),
            Err(_) => (2, 0.0),
        },
    }
}

fn compare_votes(a: Option<&str>, b: Option<&str>) -> Ordering {
    let (rank_a, n_a) = vote_rank(a);
    let (rank_b, n_b) = vote_rank(b);
    rank_a.cmp(&rank_b).then(n_a.total_cmp(&n_b))
}

impl SessionView {
    /// Participants with their votes, in display order.
    ///
    /// Sorted ascending by vote once revealed; by name otherwise.
    pub fn sorted_participants(&self) -> Vec<(&str, Option<&str>)> {
        let mut seats: Vec<(&str, Option<&str>)> = self
            .users
            .keys()
            .map(|name| (name.as_str(), self.votes.get(name).map(String::as_str)))
            .collect();

        if self.votes_revealed {
            seats.sort_by(|a, b| compare_votes(a.1, b.1));
        }
        seats
    }

    /// The shared value when at least two real votes exist and all agree
    pub fn consensus(&self) -> Option<&str> {
        let mut votes = self
            .votes
            .values()
            .map(String::as_str)
            .filter(|v| !v.is_empty() && *v != "?");

        let first = votes.next()?;
        let mut count = 1;
        for vote in votes {
            if vote != first {
                return None;
            }
            count += 1;
        }
        (count > 1).then_some(first)
    }
}

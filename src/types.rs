use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque ID types for type safety
pub type SessionId = String;
pub type ConnectionId = String;
pub type ParticipantName = String;

/// Cosmetic card suit assigned to a participant when they first join
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// Pick a suit uniformly at random, independently per call
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub name: ParticipantName,
    pub suit: Suit,
    pub online: bool,
}

impl Participant {
    pub fn new(name: ParticipantName) -> Self {
        Self {
            name,
            suit: Suit::random(),
            online: true,
        }
    }
}

/// Canonical session state as held by a session store.
///
/// Votes live beside the participants rather than inside them so a new round
/// can clear every vote without touching membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub participants: BTreeMap<ParticipantName, Participant>,
    pub votes: BTreeMap<ParticipantName, String>,
    pub votes_revealed: bool,
    pub created_at: DateTime<Utc>,
    /// Updated on every applied mutation (used by the idle reaper)
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            participants: BTreeMap::new(),
            votes: BTreeMap::new(),
            votes_revealed: false,
            created_at: now,
            last_activity: now,
        }
    }

    /// True when nobody is left in the session and no vote is pending
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty() && self.votes.is_empty()
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.get(name)
    }
}

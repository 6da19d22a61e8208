use crate::types::*;
use chrono::Utc;

/// The closed set of state changes a session store knows how to apply
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Join { name: ParticipantName },
    CastVote { name: ParticipantName, value: String },
    Reveal,
    /// Starts a new round: empties the votes and hides them
    ClearVotes,
    /// Hides the votes without clearing them
    HideVotes,
    SetOnline { name: ParticipantName, online: bool },
    RemoveParticipant { name: ParticipantName },
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Join { .. } => "join",
            Mutation::CastVote { .. } => "cast_vote",
            Mutation::Reveal => "reveal",
            Mutation::ClearVotes => "clear_votes",
            Mutation::HideVotes => "hide_votes",
            Mutation::SetOnline { .. } => "set_online",
            Mutation::RemoveParticipant { .. } => "remove_participant",
        }
    }
}

impl Session {
    /// Apply one mutation in place. Returns whether anything changed.
    ///
    /// Stores call this while holding exclusive access to the session, so a
    /// reader never sees a half-applied mutation.
    pub fn apply(&mut self, mutation: Mutation) -> bool {
        let changed = match mutation {
            Mutation::Join { name } => match self.participants.get_mut(&name) {
                Some(existing) => {
                    // Suit and vote stay as they were; only liveness comes back
                    let was_offline = !existing.online;
                    existing.online = true;
                    was_offline
                }
                None => {
                    self.participants
                        .insert(name.clone(), Participant::new(name));
                    true
                }
            },
            Mutation::CastVote { name, value } => {
                if !self.participants.contains_key(&name) {
                    tracing::debug!("Ignoring vote for unknown participant {}", name);
                    return false;
                }
                self.votes.insert(name, value.clone()) != Some(value)
            }
            Mutation::Reveal => !std::mem::replace(&mut self.votes_revealed, true),
            Mutation::ClearVotes => {
                let had_votes = !self.votes.is_empty();
                self.votes.clear();
                let was_revealed = std::mem::replace(&mut self.votes_revealed, false);
                had_votes || was_revealed
            }
            Mutation::HideVotes => std::mem::replace(&mut self.votes_revealed, false),
            Mutation::SetOnline { name, online } => match self.participants.get_mut(&name) {
                Some(p) => std::mem::replace(&mut p.online, online) != online,
                None => false,
            },
            Mutation::RemoveParticipant { name } => {
                let removed = self.participants.remove(&name).is_some();
                let vote_removed = self.votes.remove(&name).is_some();
                removed || vote_removed
            }
        };

        self.last_activity = Utc::now();
        changed
    }
}

//! Shared game model mirrored from the authority.
//!
//! DESIGN
//! ======
//! These shapes are the single source of truth for players and round state.
//! The client never mutates them locally: every snapshot from the push
//! channel replaces the previous one wholesale.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index into the card catalog.
pub type CardIndex = usize;

/// Server-issued token identifying one player session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(Uuid);

impl ClientIdentity {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One participant as seen in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: ClientIdentity,
    /// Display name. The authority names new players `"Guest"`.
    pub name: String,
    /// `None` while undecided.
    #[serde(default)]
    pub selected_card: Option<CardIndex>,
}

/// Round state owned by the authority.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// While calling, selections are frozen and revealed.
    pub is_calling: bool,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl GameState {
    /// Look up a player by identity.
    #[must_use]
    pub fn player(&self, id: ClientIdentity) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// Local copy of the game state. `Loading` until the first snapshot lands,
/// which is distinct from a loaded game with no players.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Mirror {
    #[default]
    Loading,
    Loaded(GameState),
}

impl Mirror {
    #[must_use]
    pub fn state(&self) -> Option<&GameState> {
        match self {
            Self::Loading => None,
            Self::Loaded(state) => Some(state),
        }
    }

    #[must_use]
    pub fn is_calling(&self) -> bool {
        self.state().is_some_and(|s| s.is_calling)
    }
}

/// Health of the push channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;

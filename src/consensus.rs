//! Consensus detection over game-state snapshots.

use crate::model::GameState;

/// True when the round is being called and every player holds the same,
/// decided card. An empty table is never a consensus.
#[must_use]
pub fn has_consensus(state: &GameState) -> bool {
    if !state.is_calling {
        return false;
    }
    let Some(first) = state.players.first() else {
        return false;
    };
    let Some(card) = first.selected_card else {
        return false;
    };
    state.players.iter().all(|p| p.selected_card == Some(card))
}

/// Edge detector for the celebration: fires once when consensus appears and
/// stays quiet while repeated snapshots keep satisfying it.
#[derive(Debug, Default)]
pub struct ConsensusDetector {
    reached: bool,
}

impl ConsensusDetector {
    /// Feed the next snapshot. Returns `true` only on the false-to-true edge.
    pub fn observe(&mut self, state: &GameState) -> bool {
        let now = has_consensus(state);
        let fired = now && !self.reached;
        self.reached = now;
        fired
    }
}

#[cfg(test)]
#[path = "consensus_test.rs"]
mod tests;

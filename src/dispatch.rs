//! Local intent to authority mutations.
//!
//! DESIGN
//! ======
//! Each operation checks its precondition locally, then issues one remote
//! call. Nothing is applied optimistically: the effect of a successful call
//! shows up in a later snapshot, and a failed one simply never does.
//!
//! ERROR HANDLING
//! ==============
//! Failures are logged at `warn` and reported back as [`Dispatch::Failed`].
//! Nothing is retried here; the next user action is the retry point.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::admin::AdminAuthenticator;
use crate::authority::{AuthorityError, GameAuthority};
use crate::catalog::GameCatalog;
use crate::model::{CardIndex, ClientIdentity, Mirror};
use crate::session::SessionManager;

/// Outcome of one dispatched intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    Failed,
    Skipped(Skip),
}

/// Why an intent was dropped before reaching the authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Skip {
    NotRegistered,
    NotAdmin,
    EmptyName,
    /// Selections are frozen while the round is being called.
    Frozen,
    UnknownCard,
    NotLoaded,
}

#[derive(Clone)]
pub struct ActionDispatcher {
    authority: Arc<dyn GameAuthority>,
    session: Arc<SessionManager>,
    admin: Arc<AdminAuthenticator>,
    catalog: Arc<GameCatalog>,
    mirror: watch::Receiver<Mirror>,
}

impl ActionDispatcher {
    #[must_use]
    pub fn new(
        authority: Arc<dyn GameAuthority>,
        session: Arc<SessionManager>,
        admin: Arc<AdminAuthenticator>,
        catalog: Arc<GameCatalog>,
        mirror: watch::Receiver<Mirror>,
    ) -> Self {
        Self { authority, session, admin, catalog, mirror }
    }

    /// Ask the authority to set this player's card.
    pub async fn select_card(&self, card: CardIndex) -> Dispatch {
        let id = match self.selection_gate() {
            Ok(id) => id,
            Err(skip) => return skipped("select_card", skip),
        };
        if !self.catalog.get().is_some_and(|c| c.contains(card)) {
            return skipped("select_card", Skip::UnknownCard);
        }
        report("select_card", self.authority.set_player_card(id, Some(card)).await)
    }

    /// Ask the authority to mark this player undecided again.
    pub async fn clear_card(&self) -> Dispatch {
        let id = match self.selection_gate() {
            Ok(id) => id,
            Err(skip) => return skipped("clear_card", skip),
        };
        report("clear_card", self.authority.set_player_card(id, None).await)
    }

    /// Rename this player. The name is trimmed; a blank name is not sent.
    pub async fn set_name(&self, name: &str) -> Dispatch {
        let Some(id) = self.session.identity() else {
            return skipped("set_name", Skip::NotRegistered);
        };
        let name = name.trim();
        if name.is_empty() {
            return skipped("set_name", Skip::EmptyName);
        }
        report("set_name", self.authority.set_player_name(id, name).await)
    }

    /// Admin only. Calls the round when open, resumes it when calling.
    pub async fn toggle_call(&self, is_calling: bool) -> Dispatch {
        if !self.admin.is_admin() {
            return skipped("toggle_call", Skip::NotAdmin);
        }
        if is_calling {
            report("resume", self.authority.resume().await)
        } else {
            report("call", self.authority.call().await)
        }
    }

    /// Admin only. Clears every selection and reopens the round.
    pub async fn reset(&self) -> Dispatch {
        if !self.admin.is_admin() {
            return skipped("reset", Skip::NotAdmin);
        }
        report("reset", self.authority.reset().await)
    }

    fn selection_gate(&self) -> Result<ClientIdentity, Skip> {
        let id = self.session.identity().ok_or(Skip::NotRegistered)?;
        match &*self.mirror.borrow() {
            Mirror::Loading => Err(Skip::NotLoaded),
            Mirror::Loaded(state) if state.is_calling => Err(Skip::Frozen),
            Mirror::Loaded(_) => Ok(id),
        }
    }
}

fn skipped(op: &'static str, skip: Skip) -> Dispatch {
    debug!(op, reason = ?skip, "intent skipped");
    Dispatch::Skipped(skip)
}

fn report(op: &'static str, result: Result<(), AuthorityError>) -> Dispatch {
    match result {
        Ok(()) => Dispatch::Sent,
        Err(e) => {
            warn!(op, error = %e, "mutation failed");
            Dispatch::Failed
        }
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;

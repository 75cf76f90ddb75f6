//! Session lifecycle: registration, heartbeat, departure.
//!
//! DESIGN
//! ======
//! The session is an explicit state machine:
//!
//! ```text
//! Unregistered -> Registering -> Active(id) -> Expired(id)
//!       ^              |
//!       +--- failure --+
//! ```
//!
//! The phase lives in a `watch` channel so the orchestrator can await the
//! single `Active -> Expired` transition, which happens when a heartbeat is
//! rejected. An expired session is never revived; the orchestrator builds a
//! fresh one instead, exactly as if the client had restarted.
//!
//! ERROR HANDLING
//! ==============
//! Heartbeat and departure calls made before registration resolves are
//! no-ops. Departure is best-effort and sent at most once: heartbeat timeout
//! on the authority is what actually evicts a vanished client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::authority::{AuthorityError, GameAuthority};
use crate::model::ClientIdentity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Unregistered,
    Registering,
    Active(ClientIdentity),
    /// The authority rejected a heartbeat for this identity.
    Expired(ClientIdentity),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("registration already in progress")]
    AlreadyRegistering,
    #[error("session already registered as {0}")]
    AlreadyRegistered(ClientIdentity),
    #[error("session {0} expired; start a new session")]
    Expired(ClientIdentity),
    #[error("authority request failed: {0}")]
    Authority(#[from] AuthorityError),
}

pub struct SessionManager {
    authority: Arc<dyn GameAuthority>,
    phase: watch::Sender<SessionPhase>,
    departed: AtomicBool,
}

impl SessionManager {
    #[must_use]
    pub fn new(authority: Arc<dyn GameAuthority>) -> Arc<Self> {
        let (phase, _) = watch::channel(SessionPhase::Unregistered);
        Arc::new(Self { authority, phase, departed: AtomicBool::new(false) })
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Receiver that observes every phase transition.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Identity while the session is active.
    #[must_use]
    pub fn identity(&self) -> Option<ClientIdentity> {
        match self.phase() {
            SessionPhase::Active(id) => Some(id),
            _ => None,
        }
    }

    /// Register with the authority. Callable once per session; a failure
    /// returns the session to `Unregistered` so the caller may retry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyRegistering`] / [`SessionError::AlreadyRegistered`]
    /// / [`SessionError::Expired`] when not `Unregistered`, or the authority
    /// error if the request fails.
    pub async fn register(&self) -> Result<ClientIdentity, SessionError> {
        let mut refused = None;
        self.phase.send_if_modified(|phase| match *phase {
            SessionPhase::Unregistered => {
                *phase = SessionPhase::Registering;
                true
            }
            SessionPhase::Registering => {
                refused = Some(SessionError::AlreadyRegistering);
                false
            }
            SessionPhase::Active(id) => {
                refused = Some(SessionError::AlreadyRegistered(id));
                false
            }
            SessionPhase::Expired(id) => {
                refused = Some(SessionError::Expired(id));
                false
            }
        });
        if let Some(err) = refused {
            return Err(err);
        }

        match self.authority.register().await {
            Ok(id) => {
                self.phase.send_replace(SessionPhase::Active(id));
                info!(player_id = %id, "registered");
                Ok(id)
            }
            Err(e) => {
                self.phase.send_replace(SessionPhase::Unregistered);
                Err(e.into())
            }
        }
    }

    /// Start the liveness loop. Ticks are skipped until the session is
    /// active; the first rejected heartbeat expires the session and ends the
    /// loop.
    #[must_use]
    pub fn start_heartbeat(self: &Arc<Self>, interval: Duration) -> HeartbeatHandle {
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let id = match session.phase() {
                    SessionPhase::Active(id) => id,
                    SessionPhase::Expired(_) => break,
                    SessionPhase::Unregistered | SessionPhase::Registering => continue,
                };
                if let Err(e) = session.authority.heartbeat(id).await {
                    session.expire(id, &e);
                    break;
                }
                debug!(player_id = %id, "heartbeat");
            }
        });
        HeartbeatHandle { task: Some(task) }
    }

    /// Best-effort departure notice, sent at most once per session and only
    /// for a resolved identity. Failures are ignored.
    pub async fn notify_departure(&self) {
        let Some(id) = self.identity() else {
            debug!("departure skipped: no active identity");
            return;
        };
        if self.departed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.authority.remove_player(id).await {
            Ok(()) => info!(player_id = %id, "departure sent"),
            Err(e) => debug!(player_id = %id, error = %e, "departure not delivered"),
        }
    }

    fn expire(&self, id: ClientIdentity, cause: &AuthorityError) {
        let expired = self.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Active(id) {
                *phase = SessionPhase::Expired(id);
                true
            } else {
                false
            }
        });
        if expired {
            warn!(player_id = %id, error = %cause, "heartbeat rejected; session expired");
        }
    }
}

/// Owns the heartbeat task. Cancelled explicitly at teardown, or on drop.
pub struct HeartbeatHandle {
    task: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    /// Stop the heartbeat. Returns `true` only for the call that actually
    /// cancelled it.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

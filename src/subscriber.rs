//! Game-state push subscription with reconnect.
//!
//! DESIGN
//! ======
//! A background task holds one push connection at a time. Every snapshot is
//! forwarded, in order and uncoalesced, to an unbounded channel for the
//! orchestrator, and also replaces the `Mirror` held in a `watch` channel for
//! readers that only want the latest state.
//!
//! ERROR HANDLING
//! ==============
//! A lost or refused connection is retried with exponential backoff. The
//! last snapshot stays in the mirror, stale but displayed, until a new one
//! arrives; nothing is synthesized locally.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::authority::GameAuthority;
use crate::backoff::BackoffPolicy;
use crate::model::{ConnectionStatus, GameState, Mirror};

pub struct GameStateSubscriber {
    mirror: watch::Receiver<Mirror>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl GameStateSubscriber {
    /// Start the subscription loop. The returned receiver yields every
    /// snapshot in delivery order.
    #[must_use]
    pub fn spawn(
        authority: Arc<dyn GameAuthority>,
        reconnect: BackoffPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<GameState>) {
        let (mirror_tx, mirror) = watch::channel(Mirror::Loading);
        let (status_tx, status) = watch::channel(ConnectionStatus::Connecting);
        let (snapshots_tx, snapshots) = mpsc::unbounded_channel();

        let task = tokio::spawn(subscription_loop(authority, reconnect, mirror_tx, status_tx, snapshots_tx));

        (Self { mirror, status, task }, snapshots)
    }

    /// Latest mirror; `Loading` until the first snapshot.
    #[must_use]
    pub fn mirror(&self) -> watch::Receiver<Mirror> {
        self.mirror.clone()
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

impl Drop for GameStateSubscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn subscription_loop(
    authority: Arc<dyn GameAuthority>,
    reconnect: BackoffPolicy,
    mirror: watch::Sender<Mirror>,
    status: watch::Sender<ConnectionStatus>,
    snapshots: mpsc::UnboundedSender<GameState>,
) {
    let mut backoff = reconnect.start();

    loop {
        status.send_replace(ConnectionStatus::Connecting);

        match authority.subscribe().await {
            Ok(mut stream) => {
                status.send_replace(ConnectionStatus::Connected);
                info!("game state channel connected");
                backoff.reset();

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(state) => {
                            mirror.send_replace(Mirror::Loaded(state.clone()));
                            if snapshots.send(state).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "game state channel failed");
                            break;
                        }
                    }
                }
                info!("game state channel lost; keeping last snapshot");
            }
            Err(e) => warn!(error = %e, "game state channel connect failed"),
        }

        status.send_replace(ConnectionStatus::Disconnected);
        tokio::time::sleep(backoff.next_delay()).await;
    }
}

#[cfg(test)]
#[path = "subscriber_test.rs"]
mod tests;

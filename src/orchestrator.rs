//! Per-client runtime loop.
//!
//! DESIGN
//! ======
//! One orchestrator drives a player's whole stay. Each *generation* is the
//! equivalent of one page load: a fresh session, admin capability, push
//! subscription and heartbeat. When the authority rejects a heartbeat the
//! generation is discarded and a new one is bootstrapped, which is the
//! only way a lost identity is healed.
//!
//! Inside a generation a single `select!` loop services, in priority order:
//! shutdown, the bootstrap future (catalog, registration, admin challenge),
//! snapshots, session phase changes, connection status and user intents.
//! Every change republishes the derived [`ClientView`].
//!
//! Intents go to one worker task per generation, which applies them in
//! arrival order. The caller never waits on the authority.
//!
//! The consensus detector outlives generations: a re-bootstrap in the
//! middle of an agreed, called round does not celebrate a second time.
//!
//! "Who am I" is resolved per view by looking up the session identity in
//! the latest snapshot. A registered identity that has not yet appeared in
//! a snapshot renders as `Loading`, never as a departed player.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admin::AdminAuthenticator;
use crate::authority::GameAuthority;
use crate::backoff::BackoffPolicy;
use crate::catalog::{Catalog, GameCatalog};
use crate::config::ClientConfig;
use crate::consensus::ConsensusDetector;
use crate::dispatch::ActionDispatcher;
use crate::model::{CardIndex, ClientIdentity, ConnectionStatus, GameState, Mirror, Player};
use crate::session::{HeartbeatHandle, SessionError, SessionManager, SessionPhase};
use crate::subscriber::GameStateSubscriber;

/// Something the local user asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    SelectCard(CardIndex),
    ClearCard,
    SetName(String),
    /// Call an open round, or resume a called one.
    ToggleCall,
    Reset,
}

/// One-shot notifications for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// Everyone revealed the same card.
    Celebrate,
    /// The authority forgot `expired`; a new session was started.
    Rebootstrapped { expired: ClientIdentity },
}

/// What a player's card looks like from this client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CardFace {
    Undecided,
    /// Decided but not yet revealed.
    Hidden,
    Shown(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerView {
    pub id: ClientIdentity,
    pub name: String,
    pub card: CardFace,
    pub is_me: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyView {
    pub me: PlayerView,
    /// Everyone, in authority order, including `me`.
    pub players: Vec<PlayerView>,
    pub is_calling: bool,
    pub is_admin: bool,
    pub cards: Vec<String>,
    pub connection: ConnectionStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ClientView {
    #[default]
    Loading,
    Ready(ReadyView),
}

/// Find this client's player in a snapshot.
#[must_use]
pub fn resolve_local_player(state: &GameState, identity: ClientIdentity) -> Option<&Player> {
    state.player(identity)
}

/// Everything a view is derived from.
pub struct ViewInputs<'a> {
    pub identity: Option<ClientIdentity>,
    pub mirror: &'a Mirror,
    pub catalog: Option<&'a Catalog>,
    pub is_admin: bool,
    pub connection: ConnectionStatus,
}

/// Derive the view. `Loading` until the identity, the catalog and a
/// snapshot containing this player are all available.
#[must_use]
pub fn build_view(inputs: &ViewInputs<'_>) -> ClientView {
    let (Some(id), Some(state), Some(catalog)) = (inputs.identity, inputs.mirror.state(), inputs.catalog)
    else {
        return ClientView::Loading;
    };
    let Some(me) = resolve_local_player(state, id) else {
        return ClientView::Loading;
    };

    let view_of = |p: &Player| {
        let is_me = p.id == id;
        let card = match p.selected_card {
            None => CardFace::Undecided,
            Some(_) if !state.is_calling && !is_me => CardFace::Hidden,
            Some(index) => catalog
                .label(index)
                .map_or(CardFace::Hidden, |label| CardFace::Shown(label.to_owned())),
        };
        PlayerView { id: p.id, name: p.name.clone(), card, is_me }
    };

    ClientView::Ready(ReadyView {
        me: view_of(me),
        players: state.players.iter().map(view_of).collect(),
        is_calling: state.is_calling,
        is_admin: inputs.is_admin,
        cards: catalog.iter().map(|(_, label)| label.to_owned()).collect(),
        connection: inputs.connection,
    })
}

pub struct ClientOrchestrator {
    authority: Arc<dyn GameAuthority>,
    config: ClientConfig,
    catalog: Arc<GameCatalog>,
    name: Option<String>,
    view: watch::Sender<ClientView>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

/// Components owned by one bootstrap.
struct Generation {
    session: Arc<SessionManager>,
    admin: Arc<AdminAuthenticator>,
    subscriber: GameStateSubscriber,
    heartbeat: HeartbeatHandle,
    dispatcher: ActionDispatcher,
    actions: mpsc::UnboundedSender<Intent>,
    worker: JoinHandle<()>,
}

enum Exit {
    Teardown,
    Expired(ClientIdentity),
}

impl ClientOrchestrator {
    #[must_use]
    pub fn new(
        authority: Arc<dyn GameAuthority>,
        config: ClientConfig,
    ) -> (Self, watch::Receiver<ClientView>, mpsc::UnboundedReceiver<ClientEvent>) {
        let (view, view_rx) = watch::channel(ClientView::Loading);
        let (events, events_rx) = mpsc::unbounded_channel();
        let catalog = Arc::new(GameCatalog::new(Arc::clone(&authority)));
        let orchestrator = Self { authority, config, catalog, name: None, view, events };
        (orchestrator, view_rx, events_rx)
    }

    /// Name to claim after each registration.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Drive the client until `shutdown` resolves or `intents` closes, then
    /// stop the heartbeat and send one departure notice.
    pub async fn run<F>(self, mut intents: mpsc::UnboundedReceiver<Intent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut detector = ConsensusDetector::default();
        loop {
            let (mut generation, mut snapshots) = self.start_generation();
            let exit = self
                .drive(&generation, &mut snapshots, &mut intents, &mut detector, shutdown.as_mut())
                .await;
            match exit {
                Exit::Teardown => {
                    generation.worker.abort();
                    generation.heartbeat.cancel();
                    generation.session.notify_departure().await;
                    info!("client stopped");
                    return;
                }
                Exit::Expired(expired) => {
                    info!(player_id = %expired, "starting a new session");
                    self.view.send_replace(ClientView::Loading);
                    let _ = self.events.send(ClientEvent::Rebootstrapped { expired });
                }
            }
        }
    }

    fn start_generation(&self) -> (Generation, mpsc::UnboundedReceiver<GameState>) {
        let session = SessionManager::new(Arc::clone(&self.authority));
        let admin = Arc::new(AdminAuthenticator::new(Arc::clone(&self.authority)));
        let (subscriber, snapshots) = GameStateSubscriber::spawn(Arc::clone(&self.authority), self.config.tuning.reconnect);
        let heartbeat = session.start_heartbeat(self.config.tuning.heartbeat_interval);
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&self.authority),
            Arc::clone(&session),
            Arc::clone(&admin),
            Arc::clone(&self.catalog),
            subscriber.mirror(),
        );
        let (actions, actions_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(apply_intents(dispatcher.clone(), subscriber.mirror(), actions_rx));
        let generation = Generation { session, admin, subscriber, heartbeat, dispatcher, actions, worker };
        (generation, snapshots)
    }

    async fn drive<F>(
        &self,
        generation: &Generation,
        snapshots: &mut mpsc::UnboundedReceiver<GameState>,
        intents: &mut mpsc::UnboundedReceiver<Intent>,
        detector: &mut ConsensusDetector,
        mut shutdown: Pin<&mut F>,
    ) -> Exit
    where
        F: Future<Output = ()>,
    {
        let mut phase = generation.session.watch_phase();
        let mut status = generation.subscriber.status();

        let bootstrap = bootstrap(Bootstrap {
            catalog: Arc::clone(&self.catalog),
            session: Arc::clone(&generation.session),
            admin: Arc::clone(&generation.admin),
            dispatcher: generation.dispatcher.clone(),
            admin_key: self.config.admin_key.clone(),
            name: self.name.clone(),
            retry: self.config.tuning.reconnect,
        });
        tokio::pin!(bootstrap);
        let mut bootstrapped = false;

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => return Exit::Teardown,
                () = &mut bootstrap, if !bootstrapped => {
                    bootstrapped = true;
                    self.publish(generation);
                }
                Some(snapshot) = snapshots.recv() => {
                    if detector.observe(&snapshot) {
                        info!(players = snapshot.players.len(), "consensus reached");
                        let _ = self.events.send(ClientEvent::Celebrate);
                    }
                    self.publish(generation);
                }
                Ok(()) = phase.changed() => {
                    if let SessionPhase::Expired(id) = *phase.borrow_and_update() {
                        return Exit::Expired(id);
                    }
                    self.publish(generation);
                }
                Ok(()) = status.changed() => self.publish(generation),
                intent = intents.recv() => match intent {
                    Some(intent) => {
                        if generation.actions.send(intent).is_err() {
                            debug!("intent dropped: worker stopped");
                        }
                    }
                    None => return Exit::Teardown,
                },
            }
        }
    }

    fn publish(&self, generation: &Generation) {
        let mirror = generation.subscriber.mirror();
        let mirror = mirror.borrow();
        let next = build_view(&ViewInputs {
            identity: generation.session.identity(),
            mirror: &mirror,
            catalog: self.catalog.get(),
            is_admin: generation.admin.is_admin(),
            connection: *generation.subscriber.status().borrow(),
        });
        self.view.send_if_modified(|view| {
            if *view == next {
                false
            } else {
                *view = next;
                true
            }
        });
    }
}

/// Apply intents one at a time, in the order the user issued them.
async fn apply_intents(
    dispatcher: ActionDispatcher,
    mirror: watch::Receiver<Mirror>,
    mut intents: mpsc::UnboundedReceiver<Intent>,
) {
    while let Some(intent) = intents.recv().await {
        match intent {
            Intent::SelectCard(card) => {
                dispatcher.select_card(card).await;
            }
            Intent::ClearCard => {
                dispatcher.clear_card().await;
            }
            Intent::SetName(name) => {
                dispatcher.set_name(&name).await;
            }
            Intent::ToggleCall => {
                let is_calling = {
                    let mirror = mirror.borrow();
                    mirror.state().is_some().then(|| mirror.is_calling())
                };
                match is_calling {
                    Some(is_calling) => {
                        dispatcher.toggle_call(is_calling).await;
                    }
                    None => debug!("toggle_call skipped: no snapshot yet"),
                }
            }
            Intent::Reset => {
                dispatcher.reset().await;
            }
        }
    }
}

struct Bootstrap {
    catalog: Arc<GameCatalog>,
    session: Arc<SessionManager>,
    admin: Arc<AdminAuthenticator>,
    dispatcher: ActionDispatcher,
    admin_key: Option<String>,
    name: Option<String>,
    retry: BackoffPolicy,
}

/// Load the catalog and register, retrying both forever, then challenge
/// for admin and claim the configured name.
async fn bootstrap(ctx: Bootstrap) {
    let mut backoff = ctx.retry.start();
    while let Err(e) = ctx.catalog.load().await {
        let delay = backoff.next_delay();
        warn!(error = %e, retry_in = ?delay, "card catalog unavailable");
        tokio::time::sleep(delay).await;
    }

    backoff.reset();
    loop {
        match ctx.session.register().await {
            Ok(_) => break,
            Err(SessionError::Authority(e)) => {
                let delay = backoff.next_delay();
                warn!(error = %e, retry_in = ?delay, "registration failed");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(error = %e, "registration refused");
                return;
            }
        }
    }

    ctx.admin.challenge(ctx.admin_key.as_deref()).await;
    if let Some(name) = ctx.name {
        ctx.dispatcher.set_name(&name).await;
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

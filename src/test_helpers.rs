//! Scripted in-memory authority shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use crate::authority::{AuthorityError, GameAuthority, StateStream};
use crate::model::{CardIndex, ClientIdentity, GameState, Player};

pub const FIB_DECK: [&str; 12] = ["0", "1", "2", "3", "5", "8", "13", "21", "100", "∞", "?", "☕"];

/// Every operation the mock has seen, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Register,
    RemovePlayer(ClientIdentity),
    Heartbeat(ClientIdentity),
    SetName(ClientIdentity, String),
    SetCard(ClientIdentity, Option<CardIndex>),
    AdminChallenge(String),
    Call,
    Resume,
    Reset,
    Cards,
    Subscribe,
}

pub type SnapshotSender = mpsc::UnboundedSender<Result<GameState, AuthorityError>>;

pub struct MockAuthority {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    admin_key: Mutex<Option<String>>,
    register_failures: AtomicUsize,
    hold_registration: AtomicBool,
    registration_gate: Notify,
    heartbeat_fails: AtomicBool,
    mutations_fail: AtomicBool,
    hold_cards: AtomicBool,
    card_gate: Notify,
    channels: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<GameState, AuthorityError>>>>,
}

impl MockAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            admin_key: Mutex::new(None),
            register_failures: AtomicUsize::new(0),
            hold_registration: AtomicBool::new(false),
            registration_gate: Notify::new(),
            heartbeat_fails: AtomicBool::new(false),
            mutations_fail: AtomicBool::new(false),
            hold_cards: AtomicBool::new(false),
            card_gate: Notify::new(),
            channels: Mutex::new(VecDeque::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn set_admin_key(&self, key: &str) {
        *self.admin_key.lock().expect("admin lock") = Some(key.to_owned());
    }

    pub fn fail_next_registrations(&self, n: usize) {
        self.register_failures.store(n, Ordering::SeqCst);
    }

    /// Park `register` until [`release_registration`](Self::release_registration).
    pub fn hold_registration(&self) {
        self.hold_registration.store(true, Ordering::SeqCst);
    }

    pub fn release_registration(&self) {
        self.hold_registration.store(false, Ordering::SeqCst);
        self.registration_gate.notify_one();
    }

    pub fn fail_heartbeats(&self, fail: bool) {
        self.heartbeat_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.mutations_fail.store(fail, Ordering::SeqCst);
    }

    /// Park `set_player_card` (after recording it) until
    /// [`release_card_updates`](Self::release_card_updates).
    pub fn hold_card_updates(&self) {
        self.hold_cards.store(true, Ordering::SeqCst);
    }

    pub fn release_card_updates(&self) {
        self.hold_cards.store(false, Ordering::SeqCst);
        self.card_gate.notify_one();
    }

    /// Queue a push channel for the next `subscribe` and return its sender.
    /// Dropping the sender ends that connection.
    pub fn open_channel(&self) -> SnapshotSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.lock().expect("channels lock").push_back(rx);
        tx
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn mutation_result(&self) -> Result<(), AuthorityError> {
        if self.mutations_fail.load(Ordering::SeqCst) {
            Err(AuthorityError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl GameAuthority for MockAuthority {
    async fn register(&self) -> Result<ClientIdentity, AuthorityError> {
        self.record(Call::Register);
        if self.hold_registration.load(Ordering::SeqCst) {
            self.registration_gate.notified().await;
        }
        let failures = self.register_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.register_failures.store(failures - 1, Ordering::SeqCst);
            return Err(AuthorityError::Timeout);
        }
        Ok(identity(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn remove_player(&self, id: ClientIdentity) -> Result<(), AuthorityError> {
        self.record(Call::RemovePlayer(id));
        self.mutation_result()
    }

    async fn heartbeat(&self, id: ClientIdentity) -> Result<(), AuthorityError> {
        self.record(Call::Heartbeat(id));
        if self.heartbeat_fails.load(Ordering::SeqCst) {
            return Err(AuthorityError::MissingField("player"));
        }
        Ok(())
    }

    async fn set_player_name(&self, id: ClientIdentity, name: &str) -> Result<(), AuthorityError> {
        self.record(Call::SetName(id, name.to_owned()));
        self.mutation_result()
    }

    async fn set_player_card(
        &self,
        id: ClientIdentity,
        card: Option<CardIndex>,
    ) -> Result<(), AuthorityError> {
        self.record(Call::SetCard(id, card));
        if self.hold_cards.load(Ordering::SeqCst) {
            self.card_gate.notified().await;
        }
        self.mutation_result()
    }

    async fn admin_challenge(&self, key: &str) -> Result<bool, AuthorityError> {
        self.record(Call::AdminChallenge(key.to_owned()));
        let expected = self.admin_key.lock().expect("admin lock").clone();
        Ok(expected.as_deref() == Some(key))
    }

    async fn call(&self) -> Result<(), AuthorityError> {
        self.record(Call::Call);
        self.mutation_result()
    }

    async fn resume(&self) -> Result<(), AuthorityError> {
        self.record(Call::Resume);
        self.mutation_result()
    }

    async fn reset(&self) -> Result<(), AuthorityError> {
        self.record(Call::Reset);
        self.mutation_result()
    }

    async fn cards(&self) -> Result<Vec<String>, AuthorityError> {
        self.record(Call::Cards);
        Ok(FIB_DECK.iter().map(|s| (*s).to_owned()).collect())
    }

    async fn subscribe(&self) -> Result<StateStream, AuthorityError> {
        self.record(Call::Subscribe);
        let Some(rx) = self.channels.lock().expect("channels lock").pop_front() else {
            return Err(AuthorityError::WsClosed);
        };
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}

pub fn identity(n: u64) -> ClientIdentity {
    ClientIdentity::new(Uuid::from_u128(u128::from(n)))
}

pub fn player(id: ClientIdentity, card: Option<CardIndex>) -> Player {
    Player { id, name: "Guest".to_owned(), selected_card: card }
}

pub fn state(is_calling: bool, players: Vec<Player>) -> GameState {
    GameState { is_calling, players }
}

/// Let spawned tasks make progress under a paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

//! Contract with the external game-state authority.
//!
//! DESIGN
//! ======
//! The authority owns the round. This crate only consumes it through the
//! operation set below, so every component takes an `Arc<dyn GameAuthority>`
//! and tests swap in a scripted mock.

use futures_util::stream::BoxStream;

use crate::model::{CardIndex, ClientIdentity, GameState};

/// One push-channel connection. The stream ending, or yielding an error,
/// means the channel was lost and must be re-established.
pub type StateStream = BoxStream<'static, Result<GameState, AuthorityError>>;

/// Transport and protocol failures talking to the authority.
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// An HTTP request failed or returned a non-success status.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The websocket handshake or a later read failed.
    #[error("websocket failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    /// The authority closed the push channel.
    #[error("websocket closed")]
    WsClosed,
    /// A binary frame could not be decoded.
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    /// A payload did not match the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    /// A required field was absent from a response.
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    /// No response before the deadline.
    #[error("timed out waiting for authority")]
    Timeout,
    /// The authority answered with an error frame.
    #[error("authority returned error for {syscall}: {message}")]
    ServerError { syscall: String, message: String },
}

/// Operations consumed from the authority.
#[async_trait::async_trait]
pub trait GameAuthority: Send + Sync {
    /// Create a player and return its identity.
    async fn register(&self) -> Result<ClientIdentity, AuthorityError>;

    async fn remove_player(&self, id: ClientIdentity) -> Result<(), AuthorityError>;

    /// Liveness signal. Failure means the authority no longer knows `id`.
    async fn heartbeat(&self, id: ClientIdentity) -> Result<(), AuthorityError>;

    async fn set_player_name(&self, id: ClientIdentity, name: &str) -> Result<(), AuthorityError>;

    /// Set (or with `None`, clear) the player's selected card.
    async fn set_player_card(
        &self,
        id: ClientIdentity,
        card: Option<CardIndex>,
    ) -> Result<(), AuthorityError>;

    /// Returns whether `key` matches the session's admin key.
    async fn admin_challenge(&self, key: &str) -> Result<bool, AuthorityError>;

    async fn call(&self) -> Result<(), AuthorityError>;

    async fn resume(&self) -> Result<(), AuthorityError>;

    async fn reset(&self) -> Result<(), AuthorityError>;

    /// Ordered card labels. Static for the session.
    async fn cards(&self) -> Result<Vec<String>, AuthorityError>;

    /// Open one push-channel connection.
    async fn subscribe(&self) -> Result<StateStream, AuthorityError>;
}

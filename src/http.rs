//! HTTP + websocket adapter for the game authority.
//!
//! ARCHITECTURE
//! ============
//! Request/response operations are JSON over HTTP. The push channel is a
//! websocket carrying binary protobuf frames (see the `frames` crate); every
//! `game:state` frame holds a complete snapshot.

use std::time::Duration;

use frames::{Frame, Status};
use futures_util::StreamExt;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::authority::{AuthorityError, GameAuthority, StateStream};
use crate::config::ClientConfig;
use crate::model::{CardIndex, ClientIdentity, GameState};

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Authority reached over the network.
#[derive(Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base_url: String,
    ws_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: Option<Uuid>,
}

#[derive(Deserialize)]
struct ChallengeResponse {
    is_admin: Option<bool>,
}

#[derive(Deserialize)]
struct CardsResponse {
    cards: Option<Vec<String>>,
}

impl HttpAuthority {
    /// Build the HTTP client from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, AuthorityError> {
        let timeout = config.tuning.request_timeout;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            ws_url: config.ws_url.clone(),
            timeout,
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<reqwest::Response, AuthorityError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.request(method, url);
        let request = match body {
            Some(json) => request.json(&json),
            None => request,
        };
        Ok(request.send().await?.error_for_status()?)
    }

    async fn post_empty(&self, path: &str) -> Result<(), AuthorityError> {
        self.send(Method::POST, path, Some(json!({}))).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl GameAuthority for HttpAuthority {
    async fn register(&self) -> Result<ClientIdentity, AuthorityError> {
        let body = self
            .send(Method::POST, "/api/players", Some(json!({})))
            .await?
            .json::<RegisterResponse>()
            .await?;
        body.id.map(ClientIdentity::new).ok_or(AuthorityError::MissingField("id"))
    }

    async fn remove_player(&self, id: ClientIdentity) -> Result<(), AuthorityError> {
        self.send(Method::DELETE, &format!("/api/players/{id}"), None).await?;
        Ok(())
    }

    async fn heartbeat(&self, id: ClientIdentity) -> Result<(), AuthorityError> {
        self.post_empty(&format!("/api/players/{id}/heartbeat")).await
    }

    async fn set_player_name(&self, id: ClientIdentity, name: &str) -> Result<(), AuthorityError> {
        let path = format!("/api/players/{id}/name");
        self.send(Method::PUT, &path, Some(json!({ "name": name }))).await?;
        Ok(())
    }

    async fn set_player_card(
        &self,
        id: ClientIdentity,
        card: Option<CardIndex>,
    ) -> Result<(), AuthorityError> {
        let path = format!("/api/players/{id}/card");
        self.send(Method::PUT, &path, Some(json!({ "card": card }))).await?;
        Ok(())
    }

    async fn admin_challenge(&self, key: &str) -> Result<bool, AuthorityError> {
        let body = self
            .send(Method::POST, "/api/admin/challenge", Some(json!({ "key": key })))
            .await?
            .json::<ChallengeResponse>()
            .await?;
        body.is_admin.ok_or(AuthorityError::MissingField("is_admin"))
    }

    async fn call(&self) -> Result<(), AuthorityError> {
        self.post_empty("/api/game/call").await
    }

    async fn resume(&self) -> Result<(), AuthorityError> {
        self.post_empty("/api/game/resume").await
    }

    async fn reset(&self) -> Result<(), AuthorityError> {
        self.post_empty("/api/game/reset").await
    }

    async fn cards(&self) -> Result<Vec<String>, AuthorityError> {
        let body = self
            .send(Method::GET, "/api/cards", None)
            .await?
            .json::<CardsResponse>()
            .await?;
        body.cards.ok_or(AuthorityError::MissingField("cards"))
    }

    async fn subscribe(&self) -> Result<StateStream, AuthorityError> {
        let (stream, _) = tokio::time::timeout(self.timeout, connect_async(self.ws_url.as_str()))
            .await
            .map_err(|_| AuthorityError::Timeout)?
            .map_err(|e| AuthorityError::WsConnect(Box::new(e)))?;
        debug!(url = %self.ws_url, "push channel open");

        let snapshots = futures_util::stream::unfold(stream, |mut stream| async move {
            next_snapshot(&mut stream).await.map(|item| (item, stream))
        });
        Ok(snapshots.boxed())
    }
}

/// Read until the next snapshot. `None` once the authority closes the socket.
async fn next_snapshot(stream: &mut WsStream) -> Option<Result<GameState, AuthorityError>> {
    loop {
        let message = match stream.next().await? {
            Ok(message) => message,
            Err(e) => return Some(Err(AuthorityError::WsConnect(Box::new(e)))),
        };
        match message {
            Message::Binary(bytes) => match decode_snapshot(&bytes) {
                Ok(Some(state)) => return Some(Ok(state)),
                Ok(None) => {}
                Err(e @ AuthorityError::ServerError { .. }) => return Some(Err(e)),
                Err(e) => warn!(error = %e, "skipping undecodable push frame"),
            },
            Message::Close(_) => return None,
            _ => {}
        }
    }
}

/// Interpret one binary frame. `Ok(None)` for frames that carry no snapshot.
pub(crate) fn decode_snapshot(bytes: &[u8]) -> Result<Option<GameState>, AuthorityError> {
    let frame = frames::decode_frame(bytes)?;
    snapshot_from_frame(frame)
}

fn snapshot_from_frame(frame: Frame) -> Result<Option<GameState>, AuthorityError> {
    if frame.syscall == frames::GAME_STATE {
        if frame.status == Status::Error {
            let message = frame.error_message().unwrap_or("subscription failed").to_owned();
            return Err(AuthorityError::ServerError { syscall: frame.syscall, message });
        }
        return Ok(Some(serde_json::from_value(frame.data)?));
    }
    if frame.syscall == frames::SESSION_CONNECTED {
        debug!("authority greeted push channel");
    } else {
        debug!(syscall = %frame.syscall, "ignoring push frame");
    }
    Ok(None)
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

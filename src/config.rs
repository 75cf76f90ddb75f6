//! Client configuration.
//!
//! A player opens the game through one page URL, e.g.
//! `http://host:7878/?key=SECRET`. Its origin locates the authority and the
//! optional `key` query parameter is the admin key. Timing knobs come from
//! environment variables:
//!
//! - `CALL_HEARTBEAT_MS`: liveness cadence, default 3000
//! - `CALL_REQUEST_TIMEOUT_MS`: per-request deadline, default 10000
//! - `CALL_RECONNECT_MIN_MS` / `CALL_RECONNECT_MAX_MS`: retry backoff bounds,
//!   default 1000 / 10000

use std::time::Duration;

use reqwest::Url;

use crate::backoff::BackoffPolicy;

pub const DEFAULT_HEARTBEAT_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RECONNECT_MIN_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;

/// Query parameter carrying the admin key.
const ADMIN_KEY_PARAM: &str = "key";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid page URL `{0}`")]
    InvalidUrl(String),
    #[error("unsupported URL scheme `{0}`; use http or https")]
    UnsupportedScheme(String),
}

/// Timing knobs, independent of which server is targeted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tuning {
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
    pub reconnect: BackoffPolicy,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            reconnect: BackoffPolicy {
                min: Duration::from_millis(DEFAULT_RECONNECT_MIN_MS),
                max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            },
        }
    }
}

impl Tuning {
    /// Defaults overridden by `CALL_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_millis(
            env_parse("CALL_HEARTBEAT_MS", DEFAULT_HEARTBEAT_MS),
            env_parse("CALL_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS),
            env_parse("CALL_RECONNECT_MIN_MS", DEFAULT_RECONNECT_MIN_MS),
            env_parse("CALL_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS),
        )
    }

    /// Build from raw millisecond values. Every value is at least 1ms and
    /// the reconnect cap is never below its floor.
    #[must_use]
    pub fn from_millis(heartbeat_ms: u64, request_timeout_ms: u64, reconnect_min_ms: u64, reconnect_max_ms: u64) -> Self {
        let min = reconnect_min_ms.max(1);
        let max = reconnect_max_ms.max(min);
        Self {
            heartbeat_interval: Duration::from_millis(heartbeat_ms.max(1)),
            request_timeout: Duration::from_millis(request_timeout_ms.max(1)),
            reconnect: BackoffPolicy { min: Duration::from_millis(min), max: Duration::from_millis(max) },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP origin of the authority, without trailing slash.
    pub base_url: String,
    /// Push-channel endpoint.
    pub ws_url: String,
    /// Read once at startup; `None` means no admin round trip.
    pub admin_key: Option<String>,
    pub tuning: Tuning,
}

impl ClientConfig {
    /// Build a config from the page URL a player would open.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or is not http(s).
    pub fn from_page_url(page_url: &str, tuning: Tuning) -> Result<Self, ConfigError> {
        let url = Url::parse(page_url).map_err(|_| ConfigError::InvalidUrl(page_url.to_owned()))?;
        let ws_scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(ConfigError::UnsupportedScheme(other.to_owned())),
        };
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(page_url.to_owned()));
        }

        let base_url = url.origin().ascii_serialization();
        let authority = base_url
            .split_once("://")
            .map_or(base_url.as_str(), |(_, rest)| rest);
        let ws_url = format!("{ws_scheme}://{authority}/api/ws");

        Ok(Self { base_url, ws_url, admin_key: admin_key_from_url(&url), tuning })
    }
}

fn admin_key_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == ADMIN_KEY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

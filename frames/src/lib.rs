//! Frame model and protobuf codec for the game-state push channel.
//!
//! The authority pushes every game-state change to connected clients as a
//! binary frame. Payloads stay as loose JSON (`serde_json::Value`) so the
//! codec never needs to know the game model; the client crate decodes `data`
//! into its own types.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use prost_types::value::Kind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Greeting sent by the authority once a socket is accepted.
pub const SESSION_CONNECTED: &str = "session:connected";

/// Full game-state snapshot. Each one replaces the previous.
pub const GAME_STATE: &str = "game:state";

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes are not a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The `status` integer on the wire has no [`Status`] variant.
    #[error("invalid frame status: {0}")]
    InvalidStatus(i32),
}

/// Position of a frame in an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Sent by a client.
    Request,
    /// Unsolicited or streamed item (non-terminal).
    Item,
    /// Successful terminal response.
    Done,
    /// Error terminal response.
    Error,
}

impl Status {
    fn to_wire(self) -> WireStatus {
        match self {
            Self::Request => WireStatus::Request,
            Self::Item => WireStatus::Item,
            Self::Done => WireStatus::Done,
            Self::Error => WireStatus::Error,
        }
    }

    fn from_wire(raw: i32) -> Result<Self, CodecError> {
        let status = WireStatus::try_from(raw).map_err(|_| CodecError::InvalidStatus(raw))?;
        Ok(match status {
            WireStatus::Request => Self::Request,
            WireStatus::Item => Self::Item,
            WireStatus::Done => Self::Done,
            WireStatus::Error => Self::Error,
        })
    }
}

/// A single message on the push channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier (UUID string).
    pub id: String,
    /// Request this frame answers, if any.
    pub parent_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
    /// Sender, usually a player id.
    pub from: Option<String>,
    /// Namespaced operation, e.g. `"game:state"`.
    pub syscall: String,
    pub status: Status,
    pub data: Value,
}

impl Frame {
    /// Build an unsolicited item frame, as the authority sends for snapshots.
    #[must_use]
    pub fn push(syscall: impl Into<String>, data: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            parent_id: None,
            ts: now_ms(),
            from: None,
            syscall: syscall.into(),
            status: Status::Item,
            data,
        }
    }

    /// Error text carried by an error frame (`message`, then `error`).
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.data
            .get("message")
            .or_else(|| self.data.get("error"))
            .and_then(Value::as_str)
    }
}

fn now_ms() -> i64 {
    let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(elapsed.as_millis()).unwrap_or(0)
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = WireFrame {
        id: frame.id.clone(),
        parent_id: frame.parent_id.clone(),
        ts: frame.ts,
        from: frame.from.clone(),
        syscall: frame.syscall.clone(),
        status: frame.status.to_wire() as i32,
        data: Some(json_to_proto(&frame.data)),
    };
    wire.encode_to_vec()
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::InvalidStatus`] for unknown status values.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Ok(Frame {
        status: Status::from_wire(wire.status)?,
        id: wire.id,
        parent_id: wire.parent_id,
        ts: wire.ts,
        from: wire.from,
        syscall: wire.syscall,
        data: wire
            .data
            .as_ref()
            .map_or_else(|| Value::Object(Map::new()), proto_to_json),
    })
}

fn json_to_proto(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(json_to_proto).collect(),
        }),
        Value::Object(fields) => Kind::StructValue(prost_types::Struct {
            fields: fields
                .iter()
                .map(|(key, field)| (key.clone(), json_to_proto(field)))
                .collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json(value: &prost_types::Value) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => number_to_json(*n),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(proto_to_json).collect()),
        Some(Kind::StructValue(st)) => Value::Object(
            st.fields
                .iter()
                .map(|(key, field)| (key.clone(), proto_to_json(field)))
                .collect(),
        ),
    }
}

/// Protobuf numbers are all doubles; whole values come back as integers so
/// card indices survive the trip as `u64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (1_u64 << 53) as f64 {
        let whole = n as i64;
        return Value::Number(whole.into());
    }
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(string, optional, tag = "2")]
    parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(string, optional, tag = "4")]
    from: Option<String>,
    #[prost(string, tag = "5")]
    syscall: String,
    #[prost(enumeration = "WireStatus", tag = "6")]
    status: i32,
    #[prost(message, optional, tag = "7")]
    data: Option<prost_types::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireStatus {
    Request = 0,
    Item = 1,
    Done = 2,
    Error = 3,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

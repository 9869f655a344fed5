//! Wire envelope and codecs for the realtime chat transport.
//!
//! Every event exchanged with the chat server travels inside a [`Frame`]:
//! an event name plus a flexible JSON payload. Two encodings are supported:
//! protobuf binary for websocket frames, and JSON text for websocket text
//! frames and long-poll batches.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error returned by the frame decoders.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The text could not be parsed as a JSON frame or frame batch.
    #[error("failed to decode json frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single event on the realtime wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Chat room this frame is scoped to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Event name, e.g. `"send-message"`.
    pub event: String,
    /// Arbitrary JSON payload.
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl Frame {
    /// Create a frame with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts: now_ms(),
            room_id: None,
            event: event.into(),
            data,
        }
    }

    /// Scope the frame to a chat room.
    #[must_use]
    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Read a string field from the payload.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

// =============================================================================
// BINARY CODEC
// =============================================================================

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = WireFrame {
        id: frame.id.clone(),
        ts: frame.ts,
        room_id: frame.room_id.clone(),
        event: frame.event.clone(),
        data: Some(json_to_proto_value(&frame.data)),
    };

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot run out of buffer space.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Ok(Frame {
        id: wire.id,
        ts: wire.ts,
        room_id: wire.room_id,
        event: wire.event,
        data: wire.data.map_or_else(empty_object, |v| proto_to_json_value(&v)),
    })
}

// =============================================================================
// TEXT CODEC
// =============================================================================

/// Encode a frame as a JSON object string.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload cannot be serialized.
pub fn encode_text(frame: &Frame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a single JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON or missing fields.
pub fn decode_text(text: &str) -> Result<Frame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a JSON array of frames, as delivered by a long-poll response.
///
/// # Errors
///
/// Returns [`CodecError::Json`] when the body is not an array of frames.
pub fn decode_text_batch(text: &str) -> Result<Vec<Frame>, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// PROTOBUF VALUE MAPPING
// =============================================================================

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => Kind::BoolValue(*v),
        Value::Number(v) => Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => Kind::StringValue(v.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(fields) => Kind::StructValue(prost_types::Struct {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    use prost_types::value::Kind;

    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        Kind::NullValue(_) => Value::Null,
        // Protobuf carries every number as f64; integral values come back as
        // integers so ids and counts survive a round trip unchanged.
        Kind::NumberValue(v) => number_value(*v),
        Kind::StringValue(v) => Value::String(v.clone()),
        Kind::BoolValue(v) => Value::Bool(*v),
        Kind::StructValue(s) => Value::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect(),
        ),
        Kind::ListValue(list) => Value::Array(list.values.iter().map(proto_to_json_value).collect()),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        return Value::from(v as i64);
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(int64, tag = "2")]
    ts: i64,
    #[prost(string, optional, tag = "3")]
    room_id: Option<String>,
    #[prost(string, tag = "4")]
    event: String,
    #[prost(message, optional, tag = "5")]
    data: Option<prost_types::Value>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

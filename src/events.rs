//! Typed chat events and their mapping onto wire frames.
//!
//! Client→server: `join-room`, `send-message`, `typing-start`, `typing-stop`.
//! Server→client: `room-joined`, `error`, `new-message`, `user-joined`,
//! `user-left`, `user-typing`, `user-stop-typing`.

use frames::Frame;
use serde::Deserialize;
use serde_json::json;

use crate::types::{ChatMessage, MessageType, TypingUser};

pub const JOIN_ROOM: &str = "join-room";
pub const SEND_MESSAGE: &str = "send-message";
pub const TYPING_START: &str = "typing-start";
pub const TYPING_STOP: &str = "typing-stop";

pub const ROOM_JOINED: &str = "room-joined";
pub const ERROR: &str = "error";
pub const NEW_MESSAGE: &str = "new-message";
pub const USER_JOINED: &str = "user-joined";
pub const USER_LEFT: &str = "user-left";
pub const USER_TYPING: &str = "user-typing";
pub const USER_STOP_TYPING: &str = "user-stop-typing";

// =============================================================================
// CLIENT EVENTS
// =============================================================================

/// An event the client emits to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    JoinRoom {
        room_id: String,
        user_id: String,
        user_token: String,
    },
    SendMessage {
        room_id: String,
        message: String,
        message_type: MessageType,
    },
    TypingStart {
        room_id: String,
    },
    TypingStop {
        room_id: String,
    },
}

impl ClientEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => JOIN_ROOM,
            Self::SendMessage { .. } => SEND_MESSAGE,
            Self::TypingStart { .. } => TYPING_START,
            Self::TypingStop { .. } => TYPING_STOP,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::SendMessage { room_id, .. }
            | Self::TypingStart { room_id }
            | Self::TypingStop { room_id } => room_id,
        }
    }

    /// Build the wire frame for this event.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let data = match self {
            Self::JoinRoom { room_id, user_id, user_token } => {
                json!({ "roomId": room_id, "userId": user_id, "userToken": user_token })
            }
            Self::SendMessage { room_id, message, message_type } => {
                json!({ "roomId": room_id, "message": message, "messageType": message_type.as_str() })
            }
            Self::TypingStart { room_id } | Self::TypingStop { room_id } => json!({ "roomId": room_id }),
        };
        Frame::new(self.name(), data).with_room(self.room_id())
    }
}

// =============================================================================
// SERVER EVENTS
// =============================================================================

/// Payload of a `room-joined` acknowledgement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub participant_count: Option<u32>,
}

/// Payload of a server `error` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerError {
    #[serde(default)]
    pub message: String,
    /// Room the error concerns; `None` when the server did not scope it.
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantPayload {
    participant_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopTypingPayload {
    user_id: String,
}

/// An event pushed by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    RoomJoined(RoomJoined),
    Error(ServerError),
    NewMessage(ChatMessage),
    UserJoined { room_id: Option<String>, participant_count: u32 },
    UserLeft { room_id: Option<String>, participant_count: u32 },
    UserTyping { room_id: Option<String>, user: TypingUser },
    UserStopTyping { room_id: Option<String>, user_id: String },
    /// Any event name this crate does not interpret.
    Other { event: String, data: serde_json::Value },
}

impl ServerEvent {
    /// Parse a server frame into a typed event.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when a known event carries a malformed payload.
    pub fn from_frame(frame: &Frame) -> Result<Self, serde_json::Error> {
        let data = frame.data.clone();
        let room_id = room_of(frame);
        Ok(match frame.event.as_str() {
            ROOM_JOINED => Self::RoomJoined(serde_json::from_value(data)?),
            ERROR => {
                let mut err: ServerError = serde_json::from_value(data)?;
                err.room_id = room_id;
                Self::Error(err)
            }
            NEW_MESSAGE => {
                let mut message: ChatMessage = serde_json::from_value(data)?;
                if message.room_id.is_none() {
                    message.room_id.clone_from(&frame.room_id);
                }
                Self::NewMessage(message)
            }
            USER_JOINED => {
                let p: ParticipantPayload = serde_json::from_value(data)?;
                Self::UserJoined { room_id, participant_count: p.participant_count }
            }
            USER_LEFT => {
                let p: ParticipantPayload = serde_json::from_value(data)?;
                Self::UserLeft { room_id, participant_count: p.participant_count }
            }
            USER_TYPING => Self::UserTyping { room_id, user: serde_json::from_value(data)? },
            USER_STOP_TYPING => {
                let p: StopTypingPayload = serde_json::from_value(data)?;
                Self::UserStopTyping { room_id, user_id: p.user_id }
            }
            other => Self::Other { event: other.to_owned(), data },
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::RoomJoined(_) => ROOM_JOINED,
            Self::Error(_) => ERROR,
            Self::NewMessage(_) => NEW_MESSAGE,
            Self::UserJoined { .. } => USER_JOINED,
            Self::UserLeft { .. } => USER_LEFT,
            Self::UserTyping { .. } => USER_TYPING,
            Self::UserStopTyping { .. } => USER_STOP_TYPING,
            Self::Other { event, .. } => event,
        }
    }
}

/// Room a server frame is scoped to: the payload's `roomId`, else the
/// envelope's `room_id`.
fn room_of(frame: &Frame) -> Option<String> {
    frame.str_field("roomId").map(ToOwned::to_owned).or_else(|| frame.room_id.clone())
}

/// Whether an event scoped to `scope` belongs to `room_id`. Unscoped events
/// belong to every room.
#[must_use]
pub fn in_room(scope: Option<&str>, room_id: &str) -> bool {
    scope.is_none_or(|id| id == room_id)
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;

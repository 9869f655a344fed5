//! Domain types shared by the transport, session, and view layers.
//!
//! Field names on the wire are camelCase (the chat server is shared with a
//! browser client); Rust-side names follow the usual snake case.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::transport::TransportKind;

// =============================================================================
// ROOMS
// =============================================================================

/// The entity a chat room belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RoomEntity {
    Campaign(String),
    Charity(String),
}

impl RoomEntity {
    /// Path segment used by the REST join endpoint.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Campaign(_) => "campaign",
            Self::Charity(_) => "charity",
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Campaign(id) | Self::Charity(id) => id,
        }
    }
}

impl fmt::Display for RoomEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// A resolved chat room. Immutable once joined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRoom {
    pub room_id: String,
    pub entity: RoomEntity,
    /// Campaign title or charity name, when the server supplied one.
    pub title: Option<String>,
}

/// One row of the administrative active-room listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRoom {
    #[serde(alias = "_id")]
    pub room_id: String,
    #[serde(default)]
    pub participant_count: u32,
    #[serde(default)]
    pub title: Option<String>,
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Role of a message author. Unknown or missing roles read as `Donor`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Donor,
    Charity,
    Admin,
    DaoMember,
}

impl UserRole {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "charity" => Self::Charity,
            "admin" => Self::Admin,
            "dao_member" => Self::DaoMember,
            _ => Self::Donor,
        }
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Donor, Self::parse))
    }
}

/// Kind of message body sent over the realtime path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    System,
}

impl MessageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::System => "system",
        }
    }
}

/// A chat message, either pushed over the realtime transport or fetched
/// from REST history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_role: UserRole,
    pub message: String,
    /// Server timestamp, kept verbatim (ISO-8601 string or epoch millis).
    #[serde(default, deserialize_with = "timestamp_string")]
    pub timestamp: String,
    #[serde(default)]
    pub room_id: Option<String>,
}

fn timestamp_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// =============================================================================
// PRESENCE
// =============================================================================

/// A remote user currently typing. Identity is the user id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUser {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
}

/// The logged-in user on whose behalf the client acts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub role: UserRole,
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Connection state of a chat window.
///
/// The realtime client only moves between `Disconnected`, `Connecting`, and
/// `Connected`; `Fallback` is reported by the view when sends route via REST.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Fallback,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Fallback => "fallback",
        })
    }
}

/// Snapshot returned by [`crate::RealtimeClient::connection_status`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub connection_id: Option<String>,
    pub transport: Option<TransportKind>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

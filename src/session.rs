//! Operations scoped to one chat room.
//!
//! DESIGN
//! ======
//! A join is a race between the server's `room-joined` ack, its `error`
//! event, the connection dropping, and the join deadline. Acks and errors
//! scoped to another room belong to another session and are ignored. The one-shot
//! waiter is registered before the request is emitted and dropped on every
//! exit path, so an ack that arrives after the deadline finds no listener.
//!
//! Sends try the realtime path first. When the transport is down the same
//! body goes through REST, and [`SendOutcome`] records which path took it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::api::{ChatApi, SendMessageRequest};
use crate::config::ChatConfig;
use crate::events::{self, ClientEvent, RoomJoined, ServerEvent};
use crate::realtime::RealtimeClient;
use crate::types::{ChatMessage, ConnectionState, MessageType};

/// Why a join did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// The transport was not connected; nothing was sent.
    #[error("not connected to the realtime server")]
    NotConnected,

    /// Neither an ack nor an error arrived in time.
    #[error("no join acknowledgement within {0:?}")]
    Timeout(Duration),

    /// The server answered with an `error` event.
    #[error("join rejected: {0}")]
    Rejected(String),

    /// The connection closed before the server answered.
    #[error("connection closed while joining")]
    Disconnected,
}

/// Why a send did not go through on either path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendFailure {
    #[error("message is empty")]
    Empty,

    #[error("message is {len} characters, limit is {max}")]
    TooLong { max: usize, len: usize },

    /// No room is open to send to.
    #[error("no chat room is open")]
    NoRoom,

    /// The realtime path was down and the REST send failed.
    #[error("failed to send message: {0}")]
    Rest(String),
}

/// Which path delivered a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the realtime transport (fire and forget).
    Realtime,
    /// Stored through REST; carries the server's copy when it echoed one.
    Rest(Option<ChatMessage>),
    Failed(SendFailure),
}

impl SendOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

#[derive(Clone)]
pub struct RoomSession {
    client: RealtimeClient,
    api: Arc<dyn ChatApi>,
    join_timeout: Duration,
    max_message_chars: usize,
}

impl RoomSession {
    pub fn new(client: RealtimeClient, api: Arc<dyn ChatApi>, config: &ChatConfig) -> Self {
        Self {
            client,
            api,
            join_timeout: config.join_timeout,
            max_message_chars: config.max_message_chars,
        }
    }

    #[must_use]
    pub fn client(&self) -> &RealtimeClient {
        &self.client
    }

    // =========================================================================
    // JOIN
    // =========================================================================

    /// Ask the server to admit `user_id` to `room_id` and wait for its answer.
    ///
    /// Acks and errors scoped to a different room are ignored. Returns immediately with
    /// [`JoinError::NotConnected`] when the transport is down.
    pub async fn join_room(&self, room_id: &str, user_id: &str, token: &str) -> Result<RoomJoined, JoinError> {
        if !self.client.is_connected() {
            return Err(JoinError::NotConnected);
        }

        let wanted = room_id.to_owned();
        let waiter = self.client.wait_for(&[events::ROOM_JOINED, events::ERROR], move |event| match event {
            ServerEvent::RoomJoined(ack) => events::in_room(ack.room_id.as_deref(), &wanted),
            ServerEvent::Error(err) => events::in_room(err.room_id.as_deref(), &wanted),
            _ => false,
        });

        let request = ClientEvent::JoinRoom {
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            user_token: token.to_owned(),
        };
        if !self.client.emit(&request) {
            return Err(JoinError::NotConnected);
        }
        debug!(%room_id, %user_id, "session: join requested");

        let mut state = self.client.watch_state();
        let dropped = async move {
            let _ = state.wait_for(|s| *s != ConnectionState::Connected).await;
        };
        let answer = timeout(self.join_timeout, async {
            tokio::select! {
                event = waiter.recv() => event,
                () = dropped => None,
            }
        })
        .await;

        match answer {
            Ok(Some(ServerEvent::RoomJoined(ack))) => {
                info!(%room_id, participants = ?ack.participant_count, "session: joined room");
                Ok(ack)
            }
            Ok(Some(ServerEvent::Error(err))) => {
                warn!(%room_id, message = %err.message, "session: join rejected");
                Err(JoinError::Rejected(err.message))
            }
            Ok(_) => {
                warn!(%room_id, "session: connection closed while joining");
                Err(JoinError::Disconnected)
            }
            Err(_) => {
                warn!(%room_id, timeout_ms = self.join_timeout.as_millis(), "session: join timed out");
                Err(JoinError::Timeout(self.join_timeout))
            }
        }
    }

    // =========================================================================
    // SEND
    // =========================================================================

    /// Emit a message over the realtime path only. Returns whether it was
    /// dispatched; `false` means the caller must fall back to REST.
    pub fn try_send_realtime(&self, room_id: &str, message: &str, message_type: MessageType) -> bool {
        if !self.client.is_connected() {
            return false;
        }
        self.client.emit(&ClientEvent::SendMessage {
            room_id: room_id.to_owned(),
            message: message.to_owned(),
            message_type,
        })
    }

    /// Send a message, realtime first and REST when the transport is down.
    ///
    /// The body is trimmed; empty or oversized bodies fail before any I/O.
    pub async fn send_message(&self, room_id: &str, message: &str, message_type: MessageType) -> SendOutcome {
        let body = match self.validate(message) {
            Ok(body) => body,
            Err(failure) => return SendOutcome::Failed(failure),
        };
        if self.try_send_realtime(room_id, body, message_type) {
            return SendOutcome::Realtime;
        }
        debug!(%room_id, "session: realtime unavailable, sending via REST");
        self.post(room_id, body, message_type).await
    }

    /// Send a message through REST only, with the same validation.
    pub async fn send_via_rest(&self, room_id: &str, message: &str, message_type: MessageType) -> SendOutcome {
        match self.validate(message) {
            Ok(body) => self.post(room_id, body, message_type).await,
            Err(failure) => SendOutcome::Failed(failure),
        }
    }

    fn validate<'a>(&self, message: &'a str) -> Result<&'a str, SendFailure> {
        let body = message.trim();
        if body.is_empty() {
            return Err(SendFailure::Empty);
        }
        let len = body.chars().count();
        if len > self.max_message_chars {
            return Err(SendFailure::TooLong { max: self.max_message_chars, len });
        }
        Ok(body)
    }

    async fn post(&self, room_id: &str, body: &str, message_type: MessageType) -> SendOutcome {
        let request = SendMessageRequest {
            room_id: room_id.to_owned(),
            message: body.to_owned(),
            message_type,
        };
        match self.api.send_message(&request).await {
            Ok(stored) => SendOutcome::Rest(stored),
            Err(e) => {
                warn!(%room_id, error = %e, "session: REST send failed");
                SendOutcome::Failed(SendFailure::Rest(e.to_string()))
            }
        }
    }

    // =========================================================================
    // TYPING
    // =========================================================================

    /// Returns whether the event was dispatched.
    pub fn start_typing(&self, room_id: &str) -> bool {
        self.client.is_connected() && self.client.emit(&ClientEvent::TypingStart { room_id: room_id.to_owned() })
    }

    pub fn stop_typing(&self, room_id: &str) -> bool {
        self.client.is_connected() && self.client.emit(&ClientEvent::TypingStop { room_id: room_id.to_owned() })
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("client", &self.client)
            .field("join_timeout", &self.join_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

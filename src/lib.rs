//! Realtime chat rooms for campaign and charity pages.
//!
//! ARCHITECTURE
//! ============
//! A [`RealtimeClient`] owns one persistent connection to the chat server,
//! negotiated through an ordered list of transports (websocket first, long
//! polling second). [`RoomSession`] scopes operations to one joined room and
//! falls back to the REST [`ChatApi`] whenever the realtime path is down.
//! [`ChatView`] is the per-window view model: it subscribes to room events,
//! merges them with REST history, and tracks typing users and participants.
//!
//! Nothing here is a process-wide singleton. The client is an owned handle
//! that is cloned into every session, and each listener registration returns
//! its own [`Subscription`], so several windows can observe one connection.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod listeners;
pub mod message_log;
pub mod realtime;
pub mod session;
pub mod transport;
pub mod types;
pub mod typing;
pub mod view;

pub use api::{ChatApi, RestChatApi, SendMessageRequest};
pub use config::ChatConfig;
pub use credentials::{MemoryTokenStore, TokenStore, credential_token};
pub use error::ChatError;
pub use listeners::{EventWaiter, Subscription};
pub use realtime::RealtimeClient;
pub use session::{JoinError, RoomSession, SendFailure, SendOutcome};
pub use transport::{Connector, TransportKind, UpgradeConnector};
pub use types::{
    ChatMessage, ChatRoom, ChatUser, ConnectionState, ConnectionStatus, MessageType, RoomEntity,
    TypingUser, UserRole,
};
pub use view::{Banner, ChatView, ViewPhase};

#[cfg(test)]
pub(crate) mod test_support;

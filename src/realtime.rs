//! Realtime transport client.
//!
//! DESIGN
//! ======
//! `RealtimeClient` is a cheap, cloneable handle around one shared
//! connection. It is created explicitly and passed to every room session;
//! there is no global instance.
//!
//! - `connect` never fails loudly: transport errors are logged and reported
//!   as `false`, leaving callers to use their REST fallback.
//! - A reader task per link feeds inbound frames to the listener registry.
//! - Each link gets a generation number. A reader whose link has been
//!   replaced or torn down cannot touch the client's state.
//!
//! LIFECYCLE
//! =========
//! `Disconnected → Connecting → Connected`, back to `Disconnected` on
//! `disconnect()`, on a failed connect, or when the transport closes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use frames::Frame;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::events::{self, ClientEvent, ServerEvent};
use crate::listeners::{Callback, EventWaiter, ListenerRegistry, Subscription};
use crate::transport::{Connector, TransportError, TransportKind, UpgradeConnector};
use crate::types::{ChatMessage, ConnectionState, ConnectionStatus, TypingUser};

#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    connector: Arc<dyn Connector>,
    listeners: Arc<ListenerRegistry>,
    link: Mutex<Option<ActiveLink>>,
    state: watch::Sender<ConnectionState>,
    generation: AtomicU64,
}

struct ActiveLink {
    generation: u64,
    connection_id: String,
    kind: TransportKind,
    outbound: mpsc::UnboundedSender<Frame>,
    reader: JoinHandle<()>,
}

impl RealtimeClient {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ClientInner {
                connector,
                listeners: ListenerRegistry::new(),
                link: Mutex::new(None),
                state,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Client over the websocket/polling chain named by `config.transports`.
    #[must_use]
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(Arc::new(UpgradeConnector::from_config(config)))
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Establish the connection, replacing any live one. Returns whether the
    /// transport came up; failures are logged, never returned.
    pub async fn connect(&self, token: &str) -> bool {
        match self.try_connect(token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "realtime: connect failed");
                false
            }
        }
    }

    /// Like [`RealtimeClient::connect`], but hands the transport error back.
    pub async fn try_connect(&self, token: &str) -> Result<(), TransportError> {
        if self.teardown_link() {
            info!("realtime: replacing live connection");
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(ConnectionState::Connecting);

        let link = match self.inner.connector.connect(token).await {
            Ok(link) => link,
            Err(e) => {
                if self.is_current(generation) {
                    self.inner.state.send_replace(ConnectionState::Disconnected);
                }
                return Err(e);
            }
        };

        let mut slot = self.inner.link.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(generation) {
            // A disconnect or newer connect happened while we were dialing.
            debug!(connection_id = %link.connection_id, "realtime: discarding superseded link");
            return Err(TransportError::Closed);
        }

        let reader = tokio::spawn(read_loop(Arc::downgrade(&self.inner), generation, link.inbound));
        info!(connection_id = %link.connection_id, transport = %link.kind, "realtime: connected");
        *slot = Some(ActiveLink {
            generation,
            connection_id: link.connection_id,
            kind: link.kind,
            outbound: link.outbound,
            reader,
        });
        self.inner.state.send_replace(ConnectionState::Connected);
        Ok(())
    }

    /// Tear down the connection and remove every listener. No-op when idle.
    pub fn disconnect(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if self.teardown_link() {
            info!("realtime: disconnected");
        }
        self.inner.listeners.clear();
        self.inner.state.send_replace(ConnectionState::Disconnected);
    }

    fn teardown_link(&self) -> bool {
        let link = self.inner.link.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(link) = link else {
            return false;
        };
        link.reader.abort();
        // Dropping `outbound` asks the transport to close.
        drop(link.outbound);
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Observe state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        let link = self.inner.link.lock().unwrap_or_else(PoisonError::into_inner);
        ConnectionStatus {
            is_connected: self.is_connected(),
            connection_id: link.as_ref().map(|l| l.connection_id.clone()),
            transport: link.as_ref().map(|l| l.kind),
        }
    }

    // =========================================================================
    // EMIT
    // =========================================================================

    /// Dispatch an event to the server. Returns whether it was handed to the
    /// transport, not whether the server received it.
    pub fn emit(&self, event: &ClientEvent) -> bool {
        self.emit_frame(event.to_frame())
    }

    pub fn emit_frame(&self, frame: Frame) -> bool {
        let link = self.inner.link.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(link) = link.as_ref() else {
            debug!(event = %frame.event, "realtime: emit skipped, not connected");
            return false;
        };
        debug!(connection_id = %link.connection_id, event = %frame.event, "realtime: emit");
        link.outbound.send(frame).is_ok()
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Register a raw callback for a server event name.
    pub fn on(&self, event: &str, callback: Callback) -> Subscription {
        self.inner.listeners.subscribe(event, callback)
    }

    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.on(
            events::NEW_MESSAGE,
            Arc::new(move |event: &ServerEvent| {
                if let ServerEvent::NewMessage(message) = event {
                    callback(message);
                }
            }),
        )
    }

    /// Presence callbacks receive the room the event is scoped to, if any.
    pub fn on_user_joined<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&str>, u32) + Send + Sync + 'static,
    {
        self.on(
            events::USER_JOINED,
            Arc::new(move |event: &ServerEvent| {
                if let ServerEvent::UserJoined { room_id, participant_count } = event {
                    callback(room_id.as_deref(), *participant_count);
                }
            }),
        )
    }

    pub fn on_user_left<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&str>, u32) + Send + Sync + 'static,
    {
        self.on(
            events::USER_LEFT,
            Arc::new(move |event: &ServerEvent| {
                if let ServerEvent::UserLeft { room_id, participant_count } = event {
                    callback(room_id.as_deref(), *participant_count);
                }
            }),
        )
    }

    pub fn on_user_typing<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&str>, &TypingUser) + Send + Sync + 'static,
    {
        self.on(
            events::USER_TYPING,
            Arc::new(move |event: &ServerEvent| {
                if let ServerEvent::UserTyping { room_id, user } = event {
                    callback(room_id.as_deref(), user);
                }
            }),
        )
    }

    pub fn on_user_stop_typing<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&str>, &str) + Send + Sync + 'static,
    {
        self.on(
            events::USER_STOP_TYPING,
            Arc::new(move |event: &ServerEvent| {
                if let ServerEvent::UserStopTyping { room_id, user_id } = event {
                    callback(room_id.as_deref(), user_id);
                }
            }),
        )
    }

    /// One-shot wait for the first of `events` accepted by `accept`.
    pub fn wait_for<F>(&self, events: &[&str], accept: F) -> EventWaiter
    where
        F: Fn(&ServerEvent) -> bool + Send + Sync + 'static,
    {
        self.inner.listeners.wait_for(events, accept)
    }

    /// Unregister every callback, including those held by other handles.
    pub fn remove_all_listeners(&self) {
        self.inner.listeners.clear();
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.state())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

async fn read_loop(inner: Weak<ClientInner>, generation: u64, mut inbound: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = inbound.recv().await {
        let Some(inner) = inner.upgrade() else { return };
        debug!(event = %frame.event, "realtime: recv");
        inner.listeners.dispatch(&frame);
    }

    let Some(inner) = inner.upgrade() else { return };
    let mut slot = inner.link.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.as_ref().is_some_and(|link| link.generation == generation) {
        let link = slot.take();
        drop(slot);
        if let Some(link) = link {
            info!(connection_id = %link.connection_id, "realtime: transport closed");
        }
        inner.state.send_replace(ConnectionState::Disconnected);
    }
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;

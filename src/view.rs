//! Per-window chat view model.
//!
//! DESIGN
//! ======
//! A [`ChatView`] turns room events into the state a chat window renders:
//! an ordered message log, the set of remote users typing, the participant
//! count, and a short-lived error banner.
//!
//! Opening a window never fails. Join and history fetch run concurrently and
//! each is best effort; whatever goes wrong is logged and shown as a banner,
//! and the window lands in `Connected` or `Degraded`.
//!
//! LIFECYCLE
//! =========
//! `Idle → Connecting → Connected | Degraded`, back to `Idle` on `close()`.
//! In `Degraded` every send goes through REST and typing is inert.
//!
//! Event callbacks hold the shared state plus the generation they were
//! registered under. `close()` bumps the generation, so a callback already
//! in flight when its subscription is dropped changes nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::events::in_room;
use crate::listeners::Subscription;
use crate::message_log::MessageLog;
use crate::realtime::RealtimeClient;
use crate::session::{JoinError, RoomSession, SendFailure, SendOutcome};
use crate::types::{ChatMessage, ChatRoom, ChatUser, ConnectionState, MessageType, RoomEntity, TypingUser};
use crate::typing::TypingDebouncer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Open, but the realtime path never came up for this room.
    Degraded,
}

/// Inline, auto-clearing error message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Default)]
struct ViewState {
    generation: u64,
    phase: ViewPhase,
    log: MessageLog,
    typing_users: Vec<TypingUser>,
    participant_count: u32,
    banner: Option<Banner>,
    draft: String,
}

impl ViewState {
    fn raise(&mut self, message: impl Into<String>, ttl: std::time::Duration) {
        self.banner = Some(Banner { message: message.into(), expires_at: Instant::now() + ttl });
    }
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Last presence event for the room wins; there is no roster to reconcile
/// against.
fn participant_setter(
    state: Arc<Mutex<ViewState>>,
    generation: u64,
    room_id: String,
) -> impl Fn(Option<&str>, u32) + Send + Sync + 'static {
    move |scope, count| {
        if !in_room(scope, &room_id) {
            return;
        }
        let mut state = lock(&state);
        if state.generation == generation {
            state.participant_count = count;
        }
    }
}

pub struct ChatView {
    session: RoomSession,
    api: Arc<dyn ChatApi>,
    user: ChatUser,
    config: ChatConfig,
    room: Option<ChatRoom>,
    state: Arc<Mutex<ViewState>>,
    subscriptions: Vec<Subscription>,
    typing: Option<TypingDebouncer>,
}

impl ChatView {
    pub fn new(client: RealtimeClient, api: Arc<dyn ChatApi>, user: ChatUser, config: ChatConfig) -> Self {
        Self {
            session: RoomSession::new(client, Arc::clone(&api), &config),
            api,
            user,
            config,
            room: None,
            state: Arc::new(Mutex::new(ViewState::default())),
            subscriptions: Vec::new(),
            typing: None,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Resolve the room for `entity` through REST, then open it.
    ///
    /// Only the room resolution can fail; see [`ChatView::open`].
    pub async fn open_for(&mut self, entity: &RoomEntity, token: &str) -> Result<ChatRoom, ChatError> {
        let room = match self.api.join_room(entity).await {
            Ok(room) => room,
            Err(e) => {
                warn!(%entity, error = %e, "chat: could not resolve room");
                return Err(e.into());
            }
        };
        self.open(&room, token).await;
        Ok(room)
    }

    /// Open the window for `room`. Always ends in `Connected` or `Degraded`.
    pub async fn open(&mut self, room: &ChatRoom, token: &str) {
        if self.room.is_some() {
            self.close();
        }
        let room_id = room.room_id.as_str();
        info!(%room_id, entity = %room.entity, "chat: opening");
        self.room = Some(room.clone());
        lock(&self.state).phase = ViewPhase::Connecting;

        let client = self.session.client().clone();
        if !client.is_connected() && !client.connect(token).await {
            info!(%room_id, "chat: realtime unavailable, continuing over REST");
        }
        self.subscribe(room_id);

        let (joined, history) = tokio::join!(
            self.session.join_room(room_id, &self.user.id, token),
            self.api.fetch_messages(room_id, 1, self.config.history_limit),
        );

        let ttl = self.config.banner_ttl;
        let mut state = lock(&self.state);
        let joined = match joined {
            Ok(ack) => {
                if let Some(count) = ack.participant_count {
                    state.participant_count = count;
                }
                true
            }
            Err(JoinError::NotConnected) => false,
            Err(e) => {
                warn!(%room_id, error = %e, "chat: join failed, using REST");
                state.raise("Live chat is unavailable. Messages will still be sent.", ttl);
                false
            }
        };
        match history {
            Ok(page) => {
                let shown = state.log.load_history(page);
                debug!(%room_id, shown, "chat: history loaded");
            }
            Err(e) => {
                warn!(%room_id, error = %e, "chat: history fetch failed");
                state.log.history_failed();
                state.raise("Could not load earlier messages.", ttl);
            }
        }

        state.phase = if joined && client.is_connected() { ViewPhase::Connected } else { ViewPhase::Degraded };
        info!(%room_id, phase = ?state.phase, "chat: opened");
        drop(state);

        if joined {
            self.typing = Some(TypingDebouncer::new(self.session.clone(), room_id, self.config.typing_idle));
        }
    }

    /// Tear down: drop every subscription, cancel the typing timer, reset all
    /// state. The shared connection stays up for other windows.
    pub fn close(&mut self) {
        self.subscriptions.clear();
        if let Some(typing) = self.typing.take() {
            typing.cancel();
        }
        if let Some(room) = self.room.take() {
            info!(room_id = %room.room_id, "chat: closed");
        }
        let mut state = lock(&self.state);
        let generation = state.generation + 1;
        *state = ViewState { generation, ..ViewState::default() };
    }

    fn subscribe(&mut self, room_id: &str) {
        let client = self.session.client();
        let generation = lock(&self.state).generation;

        let state = Arc::clone(&self.state);
        let room = room_id.to_owned();
        let on_message = client.on_message(move |message: &ChatMessage| {
            if !in_room(message.room_id.as_deref(), &room) {
                return;
            }
            let mut state = lock(&state);
            if state.generation != generation {
                return;
            }
            state.typing_users.retain(|u| u.user_id != message.user_id);
            state.log.push_live(message.clone());
        });

        let on_joined = client.on_user_joined(participant_setter(Arc::clone(&self.state), generation, room_id.to_owned()));
        let on_left = client.on_user_left(participant_setter(Arc::clone(&self.state), generation, room_id.to_owned()));

        let state = Arc::clone(&self.state);
        let room = room_id.to_owned();
        let me = self.user.id.clone();
        let on_typing = client.on_user_typing(move |scope: Option<&str>, user: &TypingUser| {
            if user.user_id == me || !in_room(scope, &room) {
                return;
            }
            let mut state = lock(&state);
            if state.generation == generation && !state.typing_users.iter().any(|u| u.user_id == user.user_id) {
                state.typing_users.push(user.clone());
            }
        });

        let state = Arc::clone(&self.state);
        let room = room_id.to_owned();
        let on_stop = client.on_user_stop_typing(move |scope: Option<&str>, user_id: &str| {
            if !in_room(scope, &room) {
                return;
            }
            let mut state = lock(&state);
            if state.generation == generation {
                state.typing_users.retain(|u| u.user_id != user_id);
            }
        });

        self.subscriptions = vec![on_message, on_joined, on_left, on_typing, on_stop];
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Update the input value and drive the typing indicator.
    pub fn set_draft(&self, text: &str) {
        text.clone_into(&mut lock(&self.state).draft);
        if let Some(typing) = &self.typing {
            typing.keystroke(text);
        }
    }

    /// Send the current draft; it is cleared once delivered.
    pub async fn submit(&self) -> SendOutcome {
        let draft = lock(&self.state).draft.clone();
        let outcome = self.send(&draft).await;
        if outcome.is_delivered() {
            let mut state = lock(&self.state);
            // Keep anything typed while the send was in flight.
            if state.draft == draft {
                state.draft.clear();
            }
        }
        outcome
    }

    /// Send `text` to the open room.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let Some(room) = &self.room else {
            return SendOutcome::Failed(SendFailure::NoRoom);
        };
        let outcome = match self.phase() {
            ViewPhase::Connected => self.session.send_message(&room.room_id, text, MessageType::Text).await,
            _ => self.session.send_via_rest(&room.room_id, text, MessageType::Text).await,
        };

        match &outcome {
            SendOutcome::Realtime | SendOutcome::Rest(None) => {}
            SendOutcome::Rest(Some(stored)) => {
                // No push comes back without a live transport; show our copy.
                lock(&self.state).log.push_live(stored.clone());
            }
            SendOutcome::Failed(SendFailure::Empty) => return outcome,
            SendOutcome::Failed(failure) => {
                lock(&self.state).raise(failure.to_string(), self.config.banner_ttl);
                return outcome;
            }
        }
        if let Some(typing) = &self.typing {
            typing.flush();
        }
        outcome
    }

    // =========================================================================
    // STATE
    // =========================================================================

    #[must_use]
    pub fn phase(&self) -> ViewPhase {
        lock(&self.state).phase
    }

    #[must_use]
    pub fn room(&self) -> Option<&ChatRoom> {
        self.room.as_ref()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        match self.phase() {
            ViewPhase::Idle => ConnectionState::Disconnected,
            ViewPhase::Connecting => ConnectionState::Connecting,
            ViewPhase::Connected if self.session.client().is_connected() => ConnectionState::Connected,
            ViewPhase::Connected | ViewPhase::Degraded => ConnectionState::Fallback,
        }
    }

    /// Whether the realtime path is live for this window.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Whether input should be enabled. True in degraded mode too, since
    /// REST sends still work there.
    #[must_use]
    pub fn can_send(&self) -> bool {
        matches!(self.phase(), ViewPhase::Connected | ViewPhase::Degraded)
    }

    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.state).log.messages().to_vec()
    }

    #[must_use]
    pub fn typing_users(&self) -> Vec<TypingUser> {
        lock(&self.state).typing_users.clone()
    }

    #[must_use]
    pub fn participant_count(&self) -> u32 {
        lock(&self.state).participant_count
    }

    /// The current banner, unless it has expired.
    #[must_use]
    pub fn banner(&self) -> Option<Banner> {
        let mut state = lock(&self.state);
        if state.banner.as_ref().is_some_and(|b| Instant::now() >= b.expires_at) {
            state.banner = None;
        }
        state.banner.clone()
    }

    #[must_use]
    pub fn draft(&self) -> String {
        lock(&self.state).draft.clone()
    }
}

impl std::fmt::Debug for ChatView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatView")
            .field("room", &self.room)
            .field("phase", &self.phase())
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;

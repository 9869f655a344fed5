//! Typing indicator debounce.
//!
//! The first keystroke of a burst emits `typing-start`. Every keystroke
//! re-arms one trailing timer; `typing-stop` goes out when it fires, so a
//! user who pauses without sending still stops "typing" for everyone else.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::session::RoomSession;

pub struct TypingDebouncer {
    session: RoomSession,
    room_id: String,
    idle: Duration,
    state: Arc<Mutex<Burst>>,
}

#[derive(Default)]
struct Burst {
    active: bool,
    /// Bumped whenever the timer is re-armed or cancelled.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

impl Burst {
    fn disarm(&mut self) {
        self.epoch += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl TypingDebouncer {
    #[must_use]
    pub fn new(session: RoomSession, room_id: impl Into<String>, idle: Duration) -> Self {
        Self {
            session,
            room_id: room_id.into(),
            idle,
            state: Arc::new(Mutex::new(Burst::default())),
        }
    }

    /// Feed the current input value after a keystroke.
    pub fn keystroke(&self, input: &str) {
        if input.trim().is_empty() {
            self.flush();
            return;
        }

        let mut burst = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !burst.active {
            burst.active = self.session.start_typing(&self.room_id);
        }
        burst.disarm();
        let epoch = burst.epoch;

        let state = Arc::clone(&self.state);
        let session = self.session.clone();
        let room_id = self.room_id.clone();
        let idle = self.idle;
        burst.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let mut burst = state.lock().unwrap_or_else(PoisonError::into_inner);
            if burst.epoch != epoch {
                return;
            }
            burst.active = false;
            burst.timer = None;
            drop(burst);
            debug!(%room_id, "chat: typing idle");
            session.stop_typing(&room_id);
        }));
    }

    /// Stop now: cancel the timer and emit `typing-stop`. Used on send and
    /// when the input is cleared.
    pub fn flush(&self) {
        let mut burst = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        burst.disarm();
        burst.active = false;
        drop(burst);
        self.session.stop_typing(&self.room_id);
    }

    /// Cancel the timer without emitting anything.
    pub fn cancel(&self) {
        let mut burst = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        burst.disarm();
        burst.active = false;
    }

    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).active
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;

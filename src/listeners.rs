//! Event listener registry with per-subscriber handles.
//!
//! DESIGN
//! ======
//! Callbacks are stored per event name in registration order, each under its
//! own id. Every registration returns a [`Subscription`]; dropping it removes
//! exactly that callback, so several observers can share one connection
//! without replacing each other. [`ListenerRegistry::clear`] remains for
//! tearing down everything at once.
//!
//! Dispatch snapshots the matching callbacks and invokes them outside the
//! lock, so a callback may subscribe or unsubscribe without deadlocking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use frames::Frame;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::events::ServerEvent;

pub type Callback = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    by_event: Mutex<HashMap<String, Vec<(u64, Callback)>>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `callback` for `event`. The callback stays registered until
    /// the returned handle is dropped or the registry is cleared.
    pub fn subscribe(self: &Arc<Self>, event: &str, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.by_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_owned())
            .or_default()
            .push((id, callback));
        Subscription { id, registry: Arc::downgrade(self) }
    }

    /// Remove one callback. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut by_event = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        by_event.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }

    /// Remove every callback for every event.
    pub fn clear(&self) {
        self.by_event.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of registered callbacks across all events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a server frame to every callback registered for its event.
    /// Returns how many callbacks ran.
    pub fn dispatch(&self, frame: &Frame) -> usize {
        let callbacks: Vec<Callback> = {
            let by_event = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(entries) = by_event.get(&frame.event) else {
                debug!(event = %frame.event, "realtime: no listener for event");
                return 0;
            };
            entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        let event = match ServerEvent::from_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(event = %frame.event, error = %e, "realtime: malformed event payload dropped");
                return 0;
            }
        };

        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    /// Wait for the first event among `events` that satisfies `accept`.
    ///
    /// The returned waiter owns one subscription per event name; all of them
    /// are removed when the waiter is dropped, whichever event (if any) won.
    pub fn wait_for<F>(self: &Arc<Self>, events: &[&str], accept: F) -> EventWaiter
    where
        F: Fn(&ServerEvent) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let accept = Arc::new(accept);

        let subscriptions = events
            .iter()
            .map(|name| {
                let slot = Arc::clone(&slot);
                let accept = Arc::clone(&accept);
                let callback: Callback = Arc::new(move |event: &ServerEvent| {
                    if !accept(event) {
                        return;
                    }
                    if let Some(tx) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                        let _ = tx.send(event.clone());
                    }
                });
                self.subscribe(name, callback)
            })
            .collect();

        EventWaiter { rx, _subscriptions: subscriptions }
    }
}

// =============================================================================
// HANDLES
// =============================================================================

/// Handle for one registered callback. Dropping it unregisters the callback.
#[must_use = "dropping a Subscription unregisters its callback immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unregister now. Equivalent to dropping the handle.
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// One-shot wait for the first matching event.
#[must_use = "an EventWaiter does nothing unless awaited"]
pub struct EventWaiter {
    rx: oneshot::Receiver<ServerEvent>,
    _subscriptions: Vec<Subscription>,
}

impl EventWaiter {
    /// Resolve with the winning event, or `None` if the listeners were
    /// cleared before any event matched.
    pub async fn recv(self) -> Option<ServerEvent> {
        let Self { rx, _subscriptions: subscriptions } = self;
        let result = rx.await.ok();
        drop(subscriptions);
        result
    }
}

#[cfg(test)]
#[path = "listeners_test.rs"]
mod tests;

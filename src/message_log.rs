//! Ordered message log for one chat window.
//!
//! Live pushes that arrive while the first history page is still loading are
//! held back. Once history settles (loaded or failed) the log holds the page
//! in fetched order followed by the held pushes in arrival order. Every
//! append is deduplicated by message id, which also covers a push that the
//! history page already contains. Nothing is ever re-sorted by timestamp.

use std::collections::HashSet;

use crate::types::ChatMessage;

#[derive(Debug)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    seen: HashSet<String>,
    /// `Some` until history has settled.
    pending: Option<Vec<ChatMessage>>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    /// An empty log waiting for its history page.
    #[must_use]
    pub fn new() -> Self {
        Self { messages: Vec::new(), seen: HashSet::new(), pending: Some(Vec::new()) }
    }

    /// Record a realtime push. Returns whether it is visible now.
    pub fn push_live(&mut self, message: ChatMessage) -> bool {
        match &mut self.pending {
            Some(held) => {
                held.push(message);
                false
            }
            None => self.append(message),
        }
    }

    /// Apply the first history page, then release held pushes. Returns how
    /// many messages became visible. Later calls append like pushes do.
    pub fn load_history(&mut self, page: Vec<ChatMessage>) -> usize {
        let added = self.extend(page);
        added + self.release()
    }

    /// History could not be fetched: release held pushes on their own.
    pub fn history_failed(&mut self) -> usize {
        self.release()
    }

    /// Drop everything and wait for history again.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether history has settled.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.pending.is_none()
    }

    fn release(&mut self) -> usize {
        let held = self.pending.take().unwrap_or_default();
        self.extend(held)
    }

    fn extend(&mut self, batch: Vec<ChatMessage>) -> usize {
        let mut added = 0;
        for message in batch {
            if self.append(message) {
                added += 1;
            }
        }
        added
    }

    fn append(&mut self, message: ChatMessage) -> bool {
        // Without an id there is nothing to deduplicate on.
        if !message.id.is_empty() && !self.seen.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }
}

#[cfg(test)]
#[path = "message_log_test.rs"]
mod tests;

//! Credential lookup.
//!
//! The embedding application owns token storage. The chat layer only reads
//! from it, through [`TokenStore`], under the keys `accessToken` and `token`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Storage keys consulted in order.
pub const TOKEN_KEYS: [&str; 2] = ["accessToken", "token"];

/// Read-only view of the host's persistent key-value storage.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory store for embedding without persistent storage, and for tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(key: &str, token: &str) -> Self {
        let store = Self::new();
        store.set(key, token);
        store
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
}

/// The caller's credential: `accessToken`, else `token`. Blank values count
/// as absent.
pub fn credential_token(store: &dyn TokenStore) -> Option<String> {
    TOKEN_KEYS
        .iter()
        .filter_map(|key| store.get(key))
        .find(|token| !token.trim().is_empty())
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;

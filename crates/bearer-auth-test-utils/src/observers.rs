//! Recording cache-write observer.

use bearer_auth::TokenObserver;
use std::sync::{Arc, Mutex};

/// A [`TokenObserver`] remembering every `(cache_key, token)` it receives.
/// Clones share the record.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications so far, in order.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

impl TokenObserver for RecordingObserver {
    fn on_token_cached(&self, cache_key: &str, token: &str) {
        self.seen
            .lock()
            .unwrap()
            .push((cache_key.to_string(), token.to_string()));
    }
}

//! Scriptable token fetcher.

use async_trait::async_trait;
use bearer_auth::{AuthError, AuthResult, TokenFetcher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

enum Outcome {
    Result(Option<AuthResult>),
    Error(AuthError),
}

/// A [`TokenFetcher`] returning a fixed outcome and recording every call.
///
/// # Example
/// ```rust,ignore
/// let fetcher = MockFetcher::returning_token("tok").with_cache_key("svc");
/// // ... run the middleware ...
/// assert_eq!(fetcher.call_count(), 1);
/// ```
pub struct MockFetcher {
    outcome: Outcome,
    cache_key: String,
    calls: AtomicU32,
    audiences: Mutex<Vec<Option<String>>>,
}

impl MockFetcher {
    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            cache_key: "mock-fetcher".to_string(),
            calls: AtomicU32::new(0),
            audiences: Mutex::new(Vec::new()),
        }
    }

    /// Returns `{access_token: token}` on every fetch.
    pub fn returning_token(token: &str) -> Self {
        Self::returning(AuthResult::bearer(token))
    }

    /// Returns `result` on every fetch.
    pub fn returning(result: AuthResult) -> Self {
        Self::with_outcome(Outcome::Result(Some(result)))
    }

    /// Returns the no-token sentinel on every fetch.
    pub fn returning_none() -> Self {
        Self::with_outcome(Outcome::Result(None))
    }

    /// Fails every fetch with `error`.
    pub fn failing(error: AuthError) -> Self {
        Self::with_outcome(Outcome::Error(error))
    }

    /// Sets the key reported by `cache_key`, for every audience.
    pub fn with_cache_key(mut self, key: &str) -> Self {
        self.cache_key = key.to_string();
        self
    }

    /// Number of `fetch_auth_token` calls so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Audience passed to each fetch, in call order.
    pub fn audiences(&self) -> Vec<Option<String>> {
        self.audiences.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenFetcher for MockFetcher {
    async fn fetch_auth_token(
        &self,
        audience: Option<&str>,
    ) -> Result<Option<AuthResult>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.audiences
            .lock()
            .unwrap()
            .push(audience.map(str::to_string));

        match &self.outcome {
            Outcome::Result(result) => Ok(result.clone()),
            Outcome::Error(error) => Err(error.clone()),
        }
    }

    fn cache_key(&self, _audience: Option<&str>) -> String {
        self.cache_key.clone()
    }
}

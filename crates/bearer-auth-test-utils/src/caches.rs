//! Recording token cache.

use async_trait::async_trait;
use bearer_auth::secret::{ExposeSecret, SecretString};
use bearer_auth::{AuthError, TokenCache};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// One recorded `set` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheWrite {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

/// A [`TokenCache`] that records every call and never expires entries.
///
/// Share it with the middleware through an `Arc` and inspect it afterwards.
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, String>>,
    gets: Mutex<Vec<String>>,
    writes: Mutex<Vec<CacheWrite>>,
    failure: Option<AuthError>,
}

impl RecordingCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache whose every operation fails with `error`.
    pub fn failing(error: AuthError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Pre-populates `key`. An empty `value` is stored as present-but-empty.
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Keys looked up so far, in call order.
    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    /// `set` calls so far, in call order.
    pub fn writes(&self) -> Vec<CacheWrite> {
        self.writes.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), AuthError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TokenCache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<SecretString>, AuthError> {
        self.gets.lock().unwrap().push(key.to_string());
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|v| SecretString::from(v.clone())))
    }

    async fn set(&self, key: &str, value: SecretString, ttl: Duration) -> Result<(), AuthError> {
        self.check()?;
        let value = value.expose_secret().to_string();
        self.writes.lock().unwrap().push(CacheWrite {
            key: key.to_string(),
            value: value.clone(),
            ttl,
        });
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

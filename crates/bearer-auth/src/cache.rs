//! Token caches.
//!
//! [`TokenCache`] is the store the middleware consults before fetching. Any
//! TTL-capable key-value store can back it (Redis, memcached, a shared
//! process cache). [`MemoryTokenCache`] is the in-process implementation.
//!
//! A stored empty value is reported as `Some("")`, distinct from an absent
//! key, so callers can tell "present but empty" from "not present".

use crate::error::AuthError;
use crate::secret::{ExposeSecret, SecretString};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;

/// Expiry used when `now + ttl` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A key-value store with per-entry time-to-live.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Looks up `key`, returning `None` when absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Cache` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<SecretString>, AuthError>;

    /// Stores `value` under `key` for `ttl`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Cache` if the store cannot be written.
    async fn set(&self, key: &str, value: SecretString, ttl: Duration) -> Result<(), AuthError>;

    /// Expires `key` immediately.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Cache` if the store cannot be written.
    async fn remove(&self, key: &str) -> Result<(), AuthError>;
}

#[async_trait]
impl<T> TokenCache for Arc<T>
where
    T: TokenCache + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<SecretString>, AuthError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: SecretString, ttl: Duration) -> Result<(), AuthError> {
        (**self).set(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        (**self).remove(key).await
    }
}

/// A cached token and when it stops being served.
#[derive(Clone)]
pub struct CacheEntry {
    value: SecretString,
    expires_at: Instant,
}

impl CacheEntry {
    /// Creates an entry expiring `ttl` from now.
    ///
    /// A `ttl` too large for the clock is clamped to a far-future expiry.
    #[must_use]
    pub fn new(value: SecretString, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self { value, expires_at }
    }

    /// The cached token.
    #[must_use]
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    /// Whether the entry has reached its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// In-process token cache.
///
/// Clones share the same entries. Expired entries are never returned and
/// are dropped lazily on access or by [`MemoryTokenCache::purge_expired`].
#[derive(Clone, Default)]
pub struct MemoryTokenCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryTokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }
}

impl fmt::Debug for MemoryTokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTokenCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, key: &str) -> Result<Option<SecretString>, AuthError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it unless another writer refreshed it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
            trace!(target: "bearer_auth.cache", key = %key, "Evicted expired entry");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: SecretString, ttl: Duration) -> Result<(), AuthError> {
        trace!(
            target: "bearer_auth.cache",
            key = %key,
            ttl_secs = ttl.as_secs(),
            empty = value.expose_secret().is_empty(),
            "Storing entry"
        );
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

//! Caching `Authorization` middleware.
//!
//! Requests opt in by carrying an [`AuthOption`] in their extensions. For
//! each opted-in request the middleware:
//!
//! 1. Fetches directly when no cache is configured.
//! 2. Otherwise computes `prefix + fetcher.cache_key(audience)`.
//! 3. Serves a non-empty cached value without fetching.
//! 4. On a miss, fetches. A result without `access_token` is an empty token
//!    and is not cached.
//! 5. Writes a non-empty token to the cache for the configured lifetime and
//!    notifies the [`TokenObserver`] once.
//! 6. Sets `authorization: Bearer <token>` (possibly empty), replacing any
//!    prior value.
//! 7. Forwards the request and returns the downstream result unchanged.
//!
//! Fetch and cache errors propagate; there is no retry or fallback here.
//! Concurrent misses on one key may both fetch.

mod layer;
mod service;

pub use layer::AuthTokenLayer;
pub use service::{AuthTokenService, MiddlewareError};

use crate::cache::TokenCache;
use crate::config::MiddlewareConfig;
use crate::error::AuthError;
use crate::secret::{empty_secret, ExposeSecret, SecretString};
use crate::token::{AuthResult, TokenFetcher};
use http::Uri;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Mechanism name the middleware responds to by default.
pub const BEARER_AUTH_MECHANISM: &str = "bearer_auth";

/// Opt-in marker placed in a request's extensions.
///
/// Only requests whose marker names the middleware's configured mechanism
/// are decorated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOption {
    mechanism: String,
    audience: Option<String>,
}

impl AuthOption {
    /// Marker for the default [`BEARER_AUTH_MECHANISM`].
    #[must_use]
    pub fn bearer() -> Self {
        Self::named(BEARER_AUTH_MECHANISM)
    }

    /// Marker for a named mechanism.
    #[must_use]
    pub fn named(mechanism: impl Into<String>) -> Self {
        Self {
            mechanism: mechanism.into(),
            audience: None,
        }
    }

    /// Pins the audience instead of deriving it from the request URI.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// The mechanism name.
    #[must_use]
    pub fn mechanism(&self) -> &str {
        &self.mechanism
    }

    /// The explicit audience, if any.
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }
}

/// Notified synchronously after each cache write, never on cache hits.
pub trait TokenObserver: Send + Sync {
    /// Called with the full (prefixed) cache key and the token just stored.
    fn on_token_cached(&self, cache_key: &str, token: &str);
}

impl<T> TokenObserver for T
where
    T: Fn(&str, &str) + Send + Sync,
{
    fn on_token_cached(&self, cache_key: &str, token: &str) {
        self(cache_key, token);
    }
}

/// `scheme://authority/` of `uri`, or `None` for relative URIs.
#[must_use]
pub fn uri_audience(uri: &Uri) -> Option<String> {
    let scheme = uri.scheme_str()?;
    let authority = uri.authority()?;
    Some(format!("{scheme}://{authority}/"))
}

/// Resolves bearer tokens through an optional cache.
///
/// Clones share the fetcher, cache and observer.
pub struct CachingTokenProvider<F: ?Sized> {
    fetcher: Arc<F>,
    config: MiddlewareConfig,
    cache: Option<Arc<dyn TokenCache>>,
    observer: Option<Arc<dyn TokenObserver>>,
}

impl<F: ?Sized> Clone for CachingTokenProvider<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            config: self.config.clone(),
            cache: self.cache.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for CachingTokenProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingTokenProvider")
            .field("config", &self.config)
            .field("cache", &self.cache.is_some())
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl<F> CachingTokenProvider<F> {
    /// Creates a provider with no cache and no observer.
    #[must_use]
    pub fn new(fetcher: F, config: MiddlewareConfig) -> Self {
        Self::from_arc(Arc::new(fetcher), config)
    }
}

impl<F: ?Sized> CachingTokenProvider<F> {
    /// Creates a provider around a shared fetcher.
    #[must_use]
    pub fn from_arc(fetcher: Arc<F>, config: MiddlewareConfig) -> Self {
        Self {
            fetcher,
            config,
            cache: None,
            observer: None,
        }
    }

    /// Enables caching.
    #[must_use]
    pub fn with_cache(mut self, cache: impl TokenCache + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Sets the cache-write observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl TokenObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// The middleware configuration.
    #[must_use]
    pub fn config(&self) -> &MiddlewareConfig {
        &self.config
    }

    /// The wrapped fetcher.
    #[must_use]
    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }
}

impl<F> CachingTokenProvider<F>
where
    F: TokenFetcher + ?Sized,
{
    /// The full cache key for `audience`: prefix followed by the fetcher's
    /// key.
    #[must_use]
    pub fn cache_key(&self, audience: Option<&str>) -> String {
        format!("{}{}", self.config.prefix, self.fetcher.cache_key(audience))
    }

    /// Returns the bearer token for `audience`, or an empty token when the
    /// fetcher produced none.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unchanged, or `AuthError::Cache` if the
    /// cache fails.
    #[instrument(skip_all, name = "bearer_auth.middleware.token")]
    pub async fn token(&self, audience: Option<&str>) -> Result<SecretString, AuthError> {
        let Some(cache) = &self.cache else {
            trace!(target: "bearer_auth.middleware", "No cache configured, fetching");
            return self.fetch(audience).await;
        };

        let key = self.cache_key(audience);

        if let Some(cached) = cache.get(&key).await? {
            if !cached.expose_secret().is_empty() {
                trace!(target: "bearer_auth.middleware", key = %key, "Cache hit");
                return Ok(cached);
            }
        }

        debug!(target: "bearer_auth.middleware", key = %key, "Cache miss, fetching");
        let token = self.fetch(audience).await?;

        if token.expose_secret().is_empty() {
            debug!(target: "bearer_auth.middleware", key = %key, "No token available, not caching");
            return Ok(token);
        }

        cache.set(&key, token.clone(), self.config.lifetime).await?;
        debug!(
            target: "bearer_auth.middleware",
            key = %key,
            ttl_secs = self.config.lifetime.as_secs(),
            "Cached fetched token"
        );

        if let Some(observer) = &self.observer {
            observer.on_token_cached(&key, token.expose_secret());
        }

        Ok(token)
    }

    async fn fetch(&self, audience: Option<&str>) -> Result<SecretString, AuthError> {
        let result = self.fetcher.fetch_auth_token(audience).await?;
        Ok(result
            .and_then(|r: AuthResult| r.access_token)
            .unwrap_or_else(empty_secret))
    }
}

use super::service::AuthTokenService;
use super::{CachingTokenProvider, TokenObserver};
use crate::cache::TokenCache;
use crate::config::MiddlewareConfig;
use std::fmt;
use std::sync::Arc;
use tower::Layer;

/// Tower layer that sets `Authorization: Bearer <token>` on opted-in
/// requests.
///
/// # Example
///
/// ```rust,ignore
/// let layer = AuthTokenLayer::new(credential, MiddlewareConfig::default())
///     .with_cache(MemoryTokenCache::new())
///     .with_observer(|key: &str, _token: &str| tracing::info!(key, "token cached"));
///
/// let service = tower::ServiceBuilder::new().layer(layer).service(client);
/// ```
pub struct AuthTokenLayer<F: ?Sized> {
    provider: CachingTokenProvider<F>,
}

impl<F> AuthTokenLayer<F> {
    /// Creates a layer with no cache and no observer.
    #[must_use]
    pub fn new(fetcher: F, config: MiddlewareConfig) -> Self {
        Self::from_arc(Arc::new(fetcher), config)
    }
}

impl<F: ?Sized> AuthTokenLayer<F> {
    /// Creates a layer around a shared fetcher.
    #[must_use]
    pub fn from_arc(fetcher: Arc<F>, config: MiddlewareConfig) -> Self {
        Self {
            provider: CachingTokenProvider::from_arc(fetcher, config),
        }
    }

    /// Creates a layer from a configured provider.
    #[must_use]
    pub fn from_provider(provider: CachingTokenProvider<F>) -> Self {
        Self { provider }
    }

    /// Enables caching.
    #[must_use]
    pub fn with_cache(self, cache: impl TokenCache + 'static) -> Self {
        Self {
            provider: self.provider.with_cache(cache),
        }
    }

    /// Sets the cache-write observer.
    #[must_use]
    pub fn with_observer(self, observer: impl TokenObserver + 'static) -> Self {
        Self {
            provider: self.provider.with_observer(observer),
        }
    }

    /// The token provider shared by every wrapped service.
    #[must_use]
    pub fn provider(&self) -> &CachingTokenProvider<F> {
        &self.provider
    }
}

impl<F: ?Sized> Clone for AuthTokenLayer<F> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for AuthTokenLayer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokenLayer")
            .field("provider", &self.provider)
            .finish()
    }
}

impl<S, F: ?Sized> Layer<S> for AuthTokenLayer<F> {
    type Service = AuthTokenService<S, F>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthTokenService::new(inner, self.provider.clone())
    }
}

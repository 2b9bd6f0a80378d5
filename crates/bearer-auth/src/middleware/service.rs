use super::{uri_audience, AuthOption, CachingTokenProvider};
use crate::error::AuthError;
use crate::secret::ExposeSecret;
use crate::token::{bearer_header_value, TokenFetcher};
use http::header::AUTHORIZATION;
use http::Request;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::Service;
use tracing::{debug, trace};

/// Error returned by [`AuthTokenService`].
#[derive(Debug, Error)]
pub enum MiddlewareError<E> {
    /// Resolving the token failed. The request was not forwarded.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The wrapped service failed.
    #[error("Downstream service error: {0}")]
    Service(E),
}

impl<E> MiddlewareError<E> {
    /// The auth error, if resolving the token failed.
    #[must_use]
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Self::Auth(e) => Some(e),
            Self::Service(_) => None,
        }
    }
}

/// Service produced by [`super::AuthTokenLayer`].
pub struct AuthTokenService<S, F: ?Sized> {
    inner: S,
    provider: CachingTokenProvider<F>,
}

impl<S, F: ?Sized> AuthTokenService<S, F> {
    /// Wraps `inner`.
    pub fn new(inner: S, provider: CachingTokenProvider<F>) -> Self {
        Self { inner, provider }
    }

    /// The wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// The wrapped service, consuming `self`.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn marker<'a, B>(&self, req: &'a Request<B>) -> Option<&'a AuthOption> {
        req.extensions()
            .get::<AuthOption>()
            .filter(|option| option.mechanism() == self.provider.config().mechanism)
    }

    fn audience<B>(&self, req: &Request<B>, option: &AuthOption) -> Option<String> {
        if let Some(audience) = option.audience().filter(|a| !a.is_empty()) {
            return Some(audience.to_string());
        }
        if self.provider.config().audience_from_uri {
            return uri_audience(req.uri());
        }
        None
    }
}

impl<S: Clone, F: ?Sized> Clone for AuthTokenService<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<S: fmt::Debug, F: ?Sized> fmt::Debug for AuthTokenService<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokenService")
            .field("inner", &self.inner)
            .field("provider", &self.provider)
            .finish()
    }
}

impl<S, F, B> Service<Request<B>> for AuthTokenService<S, F>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    F: TokenFetcher + ?Sized + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = MiddlewareError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(MiddlewareError::Service)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Take the readied service and leave a fresh clone in its place
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let Some(option) = self.marker(&req) else {
            trace!(target: "bearer_auth.middleware", path = %req.uri().path(), "Request not marked, passing through");
            let fut = inner.call(req);
            return Box::pin(async move { fut.await.map_err(MiddlewareError::Service) });
        };

        let audience = self.audience(&req, option);
        let provider = self.provider.clone();

        debug!(
            target: "bearer_auth.middleware",
            method = %req.method(),
            audience = audience.as_deref().unwrap_or(""),
            "Authorizing request"
        );

        Box::pin(async move {
            let token = provider
                .token(audience.as_deref())
                .await
                .map_err(MiddlewareError::Auth)?;
            let value =
                bearer_header_value(token.expose_secret()).map_err(MiddlewareError::Auth)?;

            // insert() drops every prior value, leaving exactly one header
            req.headers_mut().insert(AUTHORIZATION, value);

            inner.call(req).await.map_err(MiddlewareError::Service)
        })
    }
}

//! Token fetcher and blob signer capabilities.
//!
//! Every credential type implements [`TokenFetcher`]; credential types backed
//! by a private key (or a remote signing service) also implement
//! [`BlobSigner`]. Implementations are selected by static type, and the
//! middleware is generic over the fetcher.
//!
//! The audience a token is scoped to is passed explicitly on every call rather
//! than stored on a shared credential, so concurrent requests targeting
//! different services cannot observe each other's audience.

use crate::error::AuthError;
use crate::secret::{ExposeSecret, SecretString};
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::fmt;
use std::sync::Arc;

/// Result of a token fetch.
///
/// Mirrors a standard OAuth 2.0 token response. Only `access_token` is
/// consulted by the middleware, and consumers must tolerate its absence.
#[derive(Clone, Default)]
pub struct AuthResult {
    /// The bearer token, if the fetcher produced one.
    pub access_token: Option<SecretString>,

    /// Token type reported by the issuer (usually `Bearer`).
    pub token_type: Option<String>,

    /// Lifetime in seconds reported by the issuer.
    pub expires_in: Option<u64>,
}

impl AuthResult {
    /// Creates a result carrying only an access token.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(SecretString::from(access_token.into())),
            token_type: Some("Bearer".to_string()),
            expires_in: None,
        }
    }

    /// Sets the reported lifetime.
    #[must_use]
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// The access token, if present.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose_secret())
    }
}

impl fmt::Debug for AuthResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResult")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Anything that can produce an auth result and a stable cache key.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// Fetches a token scoped to `audience`.
    ///
    /// May perform network I/O or pure local computation, and must not assume
    /// prior calls. Returns `Ok(None)` when no token can currently be produced
    /// (for example, an audience-scoped credential called without an
    /// audience).
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when the fetch itself fails. Callers propagate it
    /// unchanged.
    async fn fetch_auth_token(&self, audience: Option<&str>)
        -> Result<Option<AuthResult>, AuthError>;

    /// Deterministic cache key for this credential (and audience, for
    /// audience-scoped credentials). Used verbatim after prefixing.
    fn cache_key(&self, audience: Option<&str>) -> String;

    /// Fetches a token and, if one is produced, sets
    /// `authorization: Bearer <token>` on `headers`.
    ///
    /// Unlike the middleware, the header map is left untouched when no token
    /// is available.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, or `AuthError::InvalidHeader` if the token is
    /// not a valid header value.
    async fn update_metadata(
        &self,
        headers: &mut HeaderMap,
        audience: Option<&str>,
    ) -> Result<(), AuthError> {
        let result = self.fetch_auth_token(audience).await?;
        if let Some(token) = result.as_ref().and_then(AuthResult::access_token) {
            headers.insert(AUTHORIZATION, bearer_header_value(token)?);
        }
        Ok(())
    }
}

/// A [`TokenFetcher`] that can also sign arbitrary bytes.
#[async_trait]
pub trait BlobSigner: TokenFetcher {
    /// Signs `blob` with the mechanism native to this credential type and
    /// returns a base64-encoded signature.
    ///
    /// `force_local` requests local signing when a remote signer would
    /// normally be preferred. It is advisory for credential types without
    /// local key material.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the key material cannot sign.
    async fn sign_blob(&self, blob: &[u8], force_local: bool) -> Result<String, AuthError>;

    /// Human-readable principal identity, for diagnostics.
    ///
    /// # Errors
    ///
    /// Remote-backed signers may fail to resolve their identity.
    async fn client_name(&self) -> Result<String, AuthError>;
}

#[async_trait]
impl<T> TokenFetcher for Arc<T>
where
    T: TokenFetcher + ?Sized,
{
    async fn fetch_auth_token(
        &self,
        audience: Option<&str>,
    ) -> Result<Option<AuthResult>, AuthError> {
        (**self).fetch_auth_token(audience).await
    }

    fn cache_key(&self, audience: Option<&str>) -> String {
        (**self).cache_key(audience)
    }
}

#[async_trait]
impl<T> BlobSigner for Arc<T>
where
    T: BlobSigner + ?Sized,
{
    async fn sign_blob(&self, blob: &[u8], force_local: bool) -> Result<String, AuthError> {
        (**self).sign_blob(blob, force_local).await
    }

    async fn client_name(&self) -> Result<String, AuthError> {
        (**self).client_name().await
    }
}

/// Builds a sensitive `Bearer <token>` header value. An empty token yields
/// `"Bearer "`.
///
/// # Errors
///
/// Returns `AuthError::InvalidHeader` if the token contains bytes that are
/// not allowed in a header value.
pub fn bearer_header_value(token: &str) -> Result<HeaderValue, AuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
        tracing::debug!(target: "bearer_auth.token", error = %e, "Token is not a valid header value");
        AuthError::InvalidHeader("token contains invalid characters".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

//! Bearer credentials for outbound HTTP requests.
//!
//! This crate issues and caches bearer tokens and injects them as
//! `Authorization` headers:
//!
//! - [`token`]: the [`TokenFetcher`] / [`BlobSigner`] capabilities every
//!   credential type implements
//! - [`jwt`]: [`SelfSignedJwtCredential`], which mints audience-scoped RS256
//!   tokens locally from a service account key file
//! - [`oauth2`]: [`ClientCredentialsFetcher`], an OAuth 2.0 client
//!   credentials fetcher
//! - [`cache`]: the [`TokenCache`] store abstraction and an in-memory store
//! - [`middleware`]: a `tower` layer that consults the cache, fetches on a
//!   miss and sets the header on requests that opt in
//!
//! # Example
//!
//! ```rust,ignore
//! use bearer_auth::{AuthOption, AuthTokenLayer, MemoryTokenCache, MiddlewareConfig};
//! use bearer_auth::SelfSignedJwtCredential;
//! use tower::ServiceBuilder;
//!
//! let credential = SelfSignedJwtCredential::from_key_file("service-account.json")?;
//! let layer = AuthTokenLayer::new(credential, MiddlewareConfig::default())
//!     .with_cache(MemoryTokenCache::new());
//!
//! let service = ServiceBuilder::new().layer(layer).service(http_client);
//!
//! let mut request = http::Request::get("https://svc.example.com/v1/items").body(())?;
//! request.extensions_mut().insert(AuthOption::bearer());
//! ```

#![warn(clippy::pedantic)]

/// Module for the crate error type
pub mod error;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the token fetcher and blob signer capabilities
pub mod token;

/// Module for service account key files
pub mod key_file;

/// Module for self-signed JWT access credentials
pub mod jwt;

/// Module for the OAuth 2.0 client credentials fetcher
pub mod oauth2;

/// Module for token caches
pub mod cache;

/// Module for middleware and binary configuration
pub mod config;

/// Module for the caching `Authorization` middleware
pub mod middleware;

pub use cache::{MemoryTokenCache, TokenCache};
pub use config::{MiddlewareConfig, MintConfig, DEFAULT_CACHE_LIFETIME};
pub use error::{AuthError, Result};
pub use jwt::{JwtAccessClaims, SelfSignedJwtCredential};
pub use key_file::ServiceAccountKey;
pub use middleware::{
    AuthOption, AuthTokenLayer, AuthTokenService, CachingTokenProvider, MiddlewareError,
    TokenObserver, BEARER_AUTH_MECHANISM,
};
pub use oauth2::{ClientCredentialsConfig, ClientCredentialsFetcher};
pub use token::{AuthResult, BlobSigner, TokenFetcher};

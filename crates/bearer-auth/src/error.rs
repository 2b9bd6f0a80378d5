//! Error types for bearer credential issuance and injection.

use thiserror::Error;

/// Errors that can occur while building credentials, fetching tokens or
/// decorating requests.
///
/// Messages never contain token values or key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Key file, JSON input or environment configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key material could not be used to sign a token or blob.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Transport failure while fetching a token.
    #[error("Token fetch failed: {0}")]
    Fetch(String),

    /// The token endpoint rejected the credentials (400, 401).
    #[error("Authentication rejected: {0}")]
    Rejected(String),

    /// The token endpoint returned a body that is not a token response.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// The token cache failed to read or write an entry.
    #[error("Token cache error: {0}")]
    Cache(String),

    /// The token cannot be carried in an HTTP header.
    #[error("Invalid authorization header: {0}")]
    InvalidHeader(String),
}

impl AuthError {
    /// Whether this error came from talking to a token endpoint.
    #[must_use]
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            AuthError::Fetch(_) | AuthError::Rejected(_) | AuthError::InvalidResponse(_)
        )
    }
}

/// Result type alias using `AuthError`
pub type Result<T> = std::result::Result<T, AuthError>;

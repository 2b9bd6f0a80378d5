//! Secret types for bearer tokens, private keys and client secrets.
//!
//! This module re-exports types from the [`secrecy`] crate. Every token value,
//! PEM-encoded private key and OAuth client secret handled by this crate is a
//! [`SecretString`], so structs holding them can derive or implement `Debug`
//! without leaking the value into logs.
//!
//! # Example
//!
//! ```rust
//! use bearer_auth::secret::{ExposeSecret, SecretString};
//!
//! let token = SecretString::from("ya29.a0Af");
//! assert!(!format!("{token:?}").contains("ya29"));
//!
//! // Header injection is the only place the value is exposed
//! let header = format!("Bearer {}", token.expose_secret());
//! assert_eq!(header, "Bearer ya29.a0Af");
//! ```
//!
//! # Serde Integration
//!
//! Structs deserialize straight into secrets:
//!
//! ```rust
//! use bearer_auth::secret::SecretString;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct TokenResponse {
//!     access_token: SecretString,
//!     expires_in: u64,
//! }
//!
//! let json = r#"{"access_token": "ya29.secret", "expires_in": 3599}"#;
//! let response: TokenResponse = serde_json::from_str(json).unwrap();
//! assert!(!format!("{response:?}").contains("ya29.secret"));
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Returns an empty secret, used as the "no token" bearer value.
#[must_use]
pub fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

//! # Bearer Auth Test Utilities
//!
//! Shared test utilities for the `bearer-auth` crate.
//!
//! This crate provides:
//! - Fixed RSA key fixtures and key-file builders
//! - A scriptable token fetcher that records its calls
//! - A recording token cache and cache-write observer
//! - A capturing downstream `tower` service
//! - Custom assertions (`JwtAssertions` trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bearer_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let fetcher = MockFetcher::returning_token("tok").with_cache_key("key");
//!     let cache = Arc::new(RecordingCache::new());
//!     let downstream = CapturingService::new();
//!
//!     // ... build the middleware and send a request ...
//!
//!     assert_eq!(downstream.authorization_headers(), vec![vec!["Bearer tok"]]);
//!     token.assert_valid_jwt().assert_for_audience(TEST_AUDIENCE);
//! }
//! ```
//!
//! Unit tests inside `bearer-auth` itself link a second copy of that crate,
//! so they may use the constants in [`key_fixtures`] but not the trait
//! implementations here. Integration tests can use everything.

pub mod assertions;
pub mod caches;
pub mod downstream;
pub mod fetchers;
pub mod key_fixtures;
pub mod observers;

// Re-export commonly used items
pub use assertions::*;
pub use caches::*;
pub use downstream::*;
pub use fetchers::*;
pub use key_fixtures::*;
pub use observers::*;

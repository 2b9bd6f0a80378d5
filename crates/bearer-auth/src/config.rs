//! Middleware and binary configuration.
//!
//! Both configs load from environment variables through a `from_vars`
//! constructor that takes a map, so tests never touch the process
//! environment.

use crate::error::AuthError;
use crate::middleware::BEARER_AUTH_MECHANISM;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default lifetime of a cached token (25 minutes).
pub const DEFAULT_CACHE_LIFETIME: Duration = Duration::from_secs(1500);

/// Env var: prefix namespacing cache keys.
pub const ENV_CACHE_PREFIX: &str = "BEARER_AUTH_CACHE_PREFIX";

/// Env var: cache lifetime in seconds.
pub const ENV_CACHE_LIFETIME_SECS: &str = "BEARER_AUTH_CACHE_LIFETIME_SECS";

/// Env var: marker mechanism the middleware responds to.
pub const ENV_MECHANISM: &str = "BEARER_AUTH_MECHANISM";

/// Env var: whether to derive the audience from the request URI.
pub const ENV_AUDIENCE_FROM_URI: &str = "BEARER_AUTH_AUDIENCE_FROM_URI";

/// Env var: path of the service account key file.
pub const ENV_KEY_FILE: &str = "BEARER_AUTH_KEY_FILE";

/// Env var: audience of the minted token.
pub const ENV_AUDIENCE: &str = "BEARER_AUTH_AUDIENCE";

/// Configuration of the caching `Authorization` middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareConfig {
    /// Prepended to every fetcher cache key.
    pub prefix: String,

    /// How long a fetched token stays in the cache.
    pub lifetime: Duration,

    /// Mechanism name a request's `AuthOption` must carry to be decorated.
    pub mechanism: String,

    /// Derive `scheme://authority/` from the request URI when the marker
    /// carries no explicit audience.
    pub audience_from_uri: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            lifetime: DEFAULT_CACHE_LIFETIME,
            mechanism: BEARER_AUTH_MECHANISM.to_string(),
            audience_from_uri: true,
        }
    }
}

impl MiddlewareConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the cache lifetime.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Set the marker mechanism.
    #[must_use]
    pub fn with_mechanism(mut self, mechanism: impl Into<String>) -> Self {
        self.mechanism = mechanism.into();
        self
    }

    /// Enable or disable audience derivation from the request URI.
    #[must_use]
    pub fn with_audience_from_uri(mut self, enabled: bool) -> Self {
        self.audience_from_uri = enabled;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`MiddlewareConfig::from_vars`].
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables. Unset variables keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the lifetime is not a positive
    /// integer, the mechanism is empty, or the audience flag is not
    /// `true`/`false`.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, AuthError> {
        let mut config = Self::default();

        if let Some(prefix) = vars.get(ENV_CACHE_PREFIX) {
            config.prefix.clone_from(prefix);
        }

        if let Some(raw) = vars.get(ENV_CACHE_LIFETIME_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|e| {
                AuthError::Configuration(format!(
                    "{ENV_CACHE_LIFETIME_SECS} must be a positive integer, got '{raw}': {e}"
                ))
            })?;
            if secs == 0 {
                return Err(AuthError::Configuration(format!(
                    "{ENV_CACHE_LIFETIME_SECS} must be greater than zero"
                )));
            }
            config.lifetime = Duration::from_secs(secs);
        }

        if let Some(mechanism) = vars.get(ENV_MECHANISM) {
            if mechanism.is_empty() {
                return Err(AuthError::Configuration(format!(
                    "{ENV_MECHANISM} must not be empty"
                )));
            }
            config.mechanism.clone_from(mechanism);
        }

        if let Some(raw) = vars.get(ENV_AUDIENCE_FROM_URI) {
            config.audience_from_uri = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(AuthError::Configuration(format!(
                        "{ENV_AUDIENCE_FROM_URI} must be true or false, got '{raw}'"
                    )))
                }
            };
        }

        Ok(config)
    }
}

/// Configuration of the `mint-jwt` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintConfig {
    /// Service account key file.
    pub key_file: PathBuf,

    /// Audience of the minted token.
    pub audience: String,
}

impl MintConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`MintConfig::from_vars`].
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if either variable is missing or
    /// empty.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, AuthError> {
        let key_file = required(vars, ENV_KEY_FILE)?;
        let audience = required(vars, ENV_AUDIENCE)?;

        Ok(Self {
            key_file: PathBuf::from(key_file),
            audience: audience.to_string(),
        })
    }
}

fn required<'a>(vars: &'a HashMap<String, String>, name: &str) -> Result<&'a str, AuthError> {
    vars.get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AuthError::Configuration(format!("Missing required environment variable: {name}"))
        })
}

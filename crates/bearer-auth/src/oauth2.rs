//! OAuth 2.0 client credentials fetcher.
//!
//! [`ClientCredentialsFetcher`] exchanges a client ID and secret for an
//! access token at a token endpoint (RFC 6749 section 4.4). It makes exactly
//! one request per fetch and never retries; caching and reuse belong to the
//! middleware.
//!
//! # Example
//!
//! ```rust,ignore
//! use bearer_auth::{ClientCredentialsConfig, ClientCredentialsFetcher};
//! use bearer_auth::secret::SecretString;
//!
//! let config = ClientCredentialsConfig::new_secure(
//!     "https://auth.example.com/oauth/token".to_string(),
//!     "my-client".to_string(),
//!     SecretString::from("secret"),
//! )?
//! .with_scope("items:read");
//!
//! let fetcher = ClientCredentialsFetcher::new(config)?;
//! ```
//!
//! # Status mapping
//!
//! | Response | Error |
//! |----------|-------|
//! | 400, 401 | `AuthError::Rejected` |
//! | other non-2xx, transport failure | `AuthError::Fetch` |
//! | 2xx with an unparseable body | `AuthError::InvalidResponse` |
//!
//! The client secret is never logged, and error bodies are logged at trace
//! level only.

use crate::error::AuthError;
use crate::secret::{ExposeSecret, SecretString};
use crate::token::{AuthResult, TokenFetcher};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

/// Default HTTP timeout for token requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client credentials endpoint configuration.
#[derive(Clone)]
pub struct ClientCredentialsConfig {
    /// Full URL of the token endpoint.
    pub token_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Requested scope, sent only when set.
    pub scope: Option<String>,

    /// HTTP request timeout.
    pub http_timeout: Duration,
}

impl fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ClientCredentialsConfig {
    /// Create a new configuration with the default timeout.
    ///
    /// Plain HTTP endpoints send the secret in clear text. Use
    /// [`ClientCredentialsConfig::new_secure`] to require HTTPS.
    #[must_use]
    pub fn new(token_url: String, client_id: String, client_secret: SecretString) -> Self {
        Self {
            token_url,
            client_id,
            client_secret,
            scope: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Create a new configuration requiring an HTTPS endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the URL doesn't use HTTPS.
    pub fn new_secure(
        token_url: String,
        client_id: String,
        client_secret: SecretString,
    ) -> Result<Self, AuthError> {
        if !token_url.starts_with("https://") {
            return Err(AuthError::Configuration(
                "token endpoint must use HTTPS".into(),
            ));
        }
        Ok(Self::new(token_url, client_id, client_secret))
    }

    /// Set the requested scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// Token endpoint response body. Every field is optional so a body without
/// `access_token` still yields a result.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl From<TokenResponse> for AuthResult {
    fn from(response: TokenResponse) -> Self {
        AuthResult {
            access_token: response.access_token.map(SecretString::from),
            token_type: response.token_type,
            expires_in: response.expires_in,
        }
    }
}

/// Fetches tokens with the client credentials grant.
///
/// The audience argument is ignored: client credentials tokens are scoped by
/// `scope`, not by target service.
#[derive(Debug, Clone)]
pub struct ClientCredentialsFetcher {
    config: ClientCredentialsConfig,
    http_client: reqwest::Client,
}

impl ClientCredentialsFetcher {
    /// Creates a fetcher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: ClientCredentialsConfig) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(config, http_client))
    }

    /// Creates a fetcher sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: ClientCredentialsConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// The fetcher configuration.
    #[must_use]
    pub fn config(&self) -> &ClientCredentialsConfig {
        &self.config
    }
}

#[async_trait]
impl TokenFetcher for ClientCredentialsFetcher {
    #[instrument(skip_all, name = "bearer_auth.oauth2.fetch_auth_token")]
    async fn fetch_auth_token(
        &self,
        _audience: Option<&str>,
    ) -> Result<Option<AuthResult>, AuthError> {
        let config = &self.config;

        debug!(
            target: "bearer_auth.oauth2",
            client_id = %config.client_id,
            url = %config.token_url,
            "Requesting client credentials token"
        );

        let mut form_body = vec![
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose_secret()),
        ];
        if let Some(scope) = &config.scope {
            form_body.push(("scope", scope.as_str()));
        }

        let response = self
            .http_client
            .post(&config.token_url)
            .form(&form_body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "bearer_auth.oauth2", error = %e, "HTTP request failed");
                AuthError::Fetch(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let token_response: TokenResponse = response.json().await.map_err(|e| {
                warn!(target: "bearer_auth.oauth2", error = %e, "Failed to parse token response");
                AuthError::InvalidResponse(e.to_string())
            })?;

            debug!(
                target: "bearer_auth.oauth2",
                has_token = token_response.access_token.is_some(),
                expires_in_secs = token_response.expires_in,
                "Token response received"
            );

            Ok(Some(token_response.into()))
        } else if status.as_u16() == 401 || status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "bearer_auth.oauth2", error = %e, "Failed to read error response body");
                "<failed to read body>".to_string()
            });
            warn!(
                target: "bearer_auth.oauth2",
                status = %status,
                "Client credentials rejected"
            );
            trace!(
                target: "bearer_auth.oauth2",
                body = %body,
                "Rejection response body"
            );
            Err(AuthError::Rejected(format!("Status {status}")))
        } else {
            warn!(
                target: "bearer_auth.oauth2",
                status = %status,
                "Unexpected response from token endpoint"
            );
            Err(AuthError::Fetch(format!("Unexpected status: {status}")))
        }
    }

    /// `client_credentials:<client_id>`, with `:<scope>` appended when a
    /// scope is configured.
    fn cache_key(&self, _audience: Option<&str>) -> String {
        match &self.config.scope {
            Some(scope) => format!("client_credentials:{}:{scope}", self.config.client_id),
            None => format!("client_credentials:{}", self.config.client_id),
        }
    }
}

//! Self-signed JWT access credentials.
//!
//! A [`SelfSignedJwtCredential`] authorizes requests with a JWT it signs
//! itself from a service account key file, instead of exchanging anything
//! with a token endpoint. Each token is scoped to one audience, normally the
//! URI of the target service.
//!
//! # Claims
//!
//! | Claim | Value |
//! |-------|-------|
//! | `iss`, `sub` | `client_email` from the key file |
//! | `aud` | the request audience |
//! | `iat` | now (Unix epoch seconds) |
//! | `exp` | `iat` + [`JWT_ACCESS_TOKEN_LIFETIME`] |
//! | `jti` | random UUID, so two tokens minted in one second differ |
//!
//! Tokens are always signed with RS256.
//!
//! # Audience
//!
//! The audience is passed to [`TokenFetcher::fetch_auth_token`] on every
//! call. A credential may also carry a default audience via
//! [`SelfSignedJwtCredential::with_audience`], which clones rather than
//! mutates, so one shared credential can serve concurrent requests for
//! different services.

use crate::error::AuthError;
use crate::key_file::ServiceAccountKey;
use crate::secret::{ExposeSecret, SecretString};
use crate::token::{AuthResult, BlobSigner, TokenFetcher};
use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Validity window of a minted token.
pub const JWT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// The only algorithm self-signed credentials use.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Claim set of a self-signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtAccessClaims {
    /// Issuer (service account identity).
    pub iss: String,
    /// Subject (same as issuer).
    pub sub: String,
    /// Audience the token is scoped to.
    pub aud: String,
    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
    /// Unique token identifier.
    pub jti: String,
}

/// Credential that mints audience-scoped RS256 tokens from a service account
/// key, with no network round trip.
#[derive(Clone)]
pub struct SelfSignedJwtCredential {
    issuer: String,
    subject: String,
    signing_key: SecretString,
    audience: Option<String>,
}

impl fmt::Debug for SelfSignedJwtCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfSignedJwtCredential")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("signing_key", &"[REDACTED]")
            .field("signing_algorithm", &SIGNING_ALGORITHM)
            .field("audience", &self.audience)
            .finish()
    }
}

impl SelfSignedJwtCredential {
    /// Loads a credential from a JSON key file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the file does not exist, is not
    /// valid JSON, or lacks `client_email` or `private_key`.
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        ServiceAccountKey::from_file(path).map(Self::from_key)
    }

    /// Builds a credential from key file contents.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` on invalid JSON or missing fields.
    pub fn from_json_str(json: &str) -> Result<Self, AuthError> {
        ServiceAccountKey::from_json_str(json).map(Self::from_key)
    }

    /// Builds a credential from a parsed key record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` on missing fields.
    pub fn from_json(value: &Value) -> Result<Self, AuthError> {
        ServiceAccountKey::from_json(value).map(Self::from_key)
    }

    /// Builds a credential from a validated key. The private key is not
    /// parsed until the first signature; malformed key material surfaces as
    /// `AuthError::Signing` then.
    #[must_use]
    pub fn from_key(key: ServiceAccountKey) -> Self {
        Self {
            issuer: key.client_email().to_string(),
            subject: key.client_email().to_string(),
            signing_key: key.private_key().clone(),
            audience: None,
        }
    }

    /// Returns a copy bound to `audience`. An empty audience leaves the
    /// credential unchanged.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        let audience = audience.into();
        if !audience.is_empty() {
            self.audience = Some(audience);
        }
        self
    }

    /// The bound audience, if any.
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    /// The token issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The token subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The signing algorithm (always RS256).
    #[must_use]
    pub fn signing_algorithm(&self) -> Algorithm {
        SIGNING_ALGORITHM
    }

    /// Picks the per-call audience when non-empty, else the bound one.
    fn resolve_audience<'a>(&'a self, audience: Option<&'a str>) -> Option<&'a str> {
        audience
            .filter(|a| !a.is_empty())
            .or(self.audience.as_deref())
    }

    fn claims_at(&self, audience: &str, now: i64) -> JwtAccessClaims {
        #[allow(clippy::cast_possible_wrap)]
        let lifetime = JWT_ACCESS_TOKEN_LIFETIME.as_secs() as i64;
        JwtAccessClaims {
            iss: self.issuer.clone(),
            sub: self.subject.clone(),
            aud: audience.to_string(),
            iat: now,
            exp: now + lifetime,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn encoding_key(&self) -> Result<EncodingKey, AuthError> {
        EncodingKey::from_rsa_pem(self.signing_key.expose_secret().as_bytes()).map_err(|e| {
            debug!(target: "bearer_auth.jwt", error = %e, "Failed to parse RSA private key");
            AuthError::Signing(format!("invalid RSA private key: {e}"))
        })
    }

    /// Mints a signed token for `audience`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the private key is malformed.
    pub fn to_jwt(&self, audience: &str) -> Result<SecretString, AuthError> {
        let claims = self.claims_at(audience, chrono::Utc::now().timestamp());
        let header = Header::new(SIGNING_ALGORITHM);

        let token = encode(&header, &claims, &self.encoding_key()?).map_err(|e| {
            debug!(target: "bearer_auth.jwt", error = %e, "JWT signing failed");
            AuthError::Signing(format!("JWT signing operation failed: {e}"))
        })?;

        debug!(
            target: "bearer_auth.jwt",
            issuer = %self.issuer,
            audience = %audience,
            exp = claims.exp,
            "Minted self-signed access token"
        );

        Ok(SecretString::from(token))
    }
}

#[async_trait]
impl TokenFetcher for SelfSignedJwtCredential {
    #[instrument(skip_all, name = "bearer_auth.jwt.fetch_auth_token")]
    async fn fetch_auth_token(
        &self,
        audience: Option<&str>,
    ) -> Result<Option<AuthResult>, AuthError> {
        let Some(audience) = self.resolve_audience(audience) else {
            debug!(target: "bearer_auth.jwt", issuer = %self.issuer, "No audience set, no token minted");
            return Ok(None);
        };

        let token = self.to_jwt(audience)?;
        Ok(Some(AuthResult {
            access_token: Some(token),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(JWT_ACCESS_TOKEN_LIFETIME.as_secs()),
        }))
    }

    /// `<issuer>` without an audience, `<issuer>|<audience>` with one, so
    /// tokens minted for different services never share a cache entry.
    fn cache_key(&self, audience: Option<&str>) -> String {
        match self.resolve_audience(audience) {
            Some(audience) => format!("{}|{audience}", self.issuer),
            None => self.issuer.clone(),
        }
    }
}

#[async_trait]
impl BlobSigner for SelfSignedJwtCredential {
    /// Signs with RSASSA-PKCS1-v1_5 SHA-256. `force_local` has no effect:
    /// signing is always local.
    async fn sign_blob(&self, blob: &[u8], _force_local: bool) -> Result<String, AuthError> {
        let signature = jsonwebtoken::crypto::sign(blob, &self.encoding_key()?, SIGNING_ALGORITHM)
            .map_err(|e| AuthError::Signing(format!("blob signing failed: {e}")))?;

        // jsonwebtoken returns base64url; callers expect standard base64
        let raw = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::Signing(format!("unexpected signature encoding: {e}")))?;
        Ok(STANDARD.encode(raw))
    }

    async fn client_name(&self) -> Result<String, AuthError> {
        Ok(self.issuer.clone())
    }
}

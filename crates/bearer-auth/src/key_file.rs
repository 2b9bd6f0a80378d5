//! Service account key files.
//!
//! Only the two fields needed to mint self-signed tokens are read:
//! `client_email` (issuer and subject) and `private_key` (PEM-encoded RSA
//! private key). Every other field in the file is ignored.

use crate::error::AuthError;
use crate::secret::SecretString;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Field holding the service account identity.
pub const CLIENT_EMAIL_FIELD: &str = "client_email";

/// Field holding the PEM-encoded private key.
pub const PRIVATE_KEY_FIELD: &str = "private_key";

/// Validated contents of a service account key file.
#[derive(Clone)]
pub struct ServiceAccountKey {
    client_email: String,
    private_key: SecretString,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl ServiceAccountKey {
    /// Creates a key from its parts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if either part is empty.
    pub fn new(
        client_email: impl Into<String>,
        private_key: SecretString,
    ) -> Result<Self, AuthError> {
        use crate::secret::ExposeSecret;

        let client_email = client_email.into();
        if client_email.is_empty() {
            return Err(missing_field(CLIENT_EMAIL_FIELD));
        }
        if private_key.expose_secret().is_empty() {
            return Err(missing_field(PRIVATE_KEY_FIELD));
        }
        Ok(Self {
            client_email,
            private_key,
        })
    }

    /// Reads and validates a key file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the file cannot be read, is not
    /// valid JSON, or lacks either required field.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            tracing::debug!(
                target: "bearer_auth.key_file",
                path = %path.display(),
                error = %e,
                "Failed to read key file"
            );
            if e.kind() == std::io::ErrorKind::NotFound {
                AuthError::Configuration("file does not exist".to_string())
            } else {
                AuthError::Configuration(format!("failed to read key file: {e}"))
            }
        })?;
        Self::from_json_str(&contents)
    }

    /// Parses and validates key file contents.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `json` is not a JSON object or
    /// lacks either required field.
    pub fn from_json_str(json: &str) -> Result<Self, AuthError> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            tracing::debug!(target: "bearer_auth.key_file", error = %e, "Key file is not valid JSON");
            AuthError::Configuration("invalid json for auth config".to_string())
        })?;
        Self::from_json(&value)
    }

    /// Validates an already-parsed key record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `value` is not an object, or a
    /// required field is absent, not a string, or empty.
    pub fn from_json(value: &Value) -> Result<Self, AuthError> {
        let record = value
            .as_object()
            .ok_or_else(|| AuthError::Configuration("invalid json for auth config".to_string()))?;

        let client_email = record
            .get(CLIENT_EMAIL_FIELD)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing_field(CLIENT_EMAIL_FIELD))?;

        let private_key = record
            .get(PRIVATE_KEY_FIELD)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing_field(PRIVATE_KEY_FIELD))?;

        Ok(Self {
            client_email: client_email.to_string(),
            private_key: SecretString::from(private_key.to_string()),
        })
    }

    /// The service account identity.
    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// The PEM-encoded private key.
    #[must_use]
    pub fn private_key(&self) -> &SecretString {
        &self.private_key
    }
}

fn missing_field(field: &str) -> AuthError {
    AuthError::Configuration(format!("json key is missing the {field} field"))
}

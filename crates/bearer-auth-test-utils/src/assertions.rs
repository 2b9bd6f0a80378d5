//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for self-signed access tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

/// JWT claims structure
#[derive(Debug, Deserialize)]
struct JwtClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
}

fn segments(token: &str) -> Vec<&str> {
    let parts: Vec<_> = token.split('.').collect();
    assert_eq!(
        parts.len(),
        3,
        "JWT must have 3 parts (header.payload.signature), got {}",
        parts.len()
    );
    parts
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str, what: &str) -> T {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT {what}: {e}"));
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("Failed to parse JWT {what} JSON: {e}"))
}

fn claims(token: &str) -> JwtClaims {
    decode_segment(segments(token)[1], "payload")
}

/// Decodes the claim set of `token` without verifying its signature.
pub fn unverified_claims(token: &str) -> serde_json::Value {
    decode_segment(segments(token)[1], "payload")
}

/// Custom assertions for compact JWTs
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt()
///     .assert_issued_by("a@b.iam")
///     .assert_for_audience("https://svc.example.com")
///     .assert_verifies_with(TEST_RSA_PUBLIC_KEY_PEM);
/// ```
pub trait JwtAssertions {
    /// Assert that the token is a well-formed RS256 JWT
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert that `iss` and `sub` both equal `identity`
    fn assert_issued_by(&self, identity: &str) -> &Self;

    /// Assert that `aud` equals `audience`
    fn assert_for_audience(&self, audience: &str) -> &Self;

    /// Assert that `exp - iat` equals `seconds`
    fn assert_lifetime(&self, seconds: i64) -> &Self;

    /// Assert that the signature verifies with the given PKCS#1 public key
    fn assert_verifies_with(&self, public_key_pem: &str) -> &Self;

    /// Assert that the signature does NOT verify with the given public key
    fn assert_rejected_by(&self, public_key_pem: &str) -> &Self;
}

impl JwtAssertions for str {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = segments(self);

        let header: JwtHeader = decode_segment(parts[0], "header");
        assert_eq!(header.alg, "RS256", "Expected RS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        let _: JwtClaims = decode_segment(parts[1], "payload");
        assert!(!parts[2].is_empty(), "JWT signature is empty");

        self
    }

    fn assert_issued_by(&self, identity: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.iss, identity, "Unexpected iss claim");
        assert_eq!(claims.sub, identity, "Unexpected sub claim");
        self
    }

    fn assert_for_audience(&self, audience: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.aud, audience, "Unexpected aud claim");
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.exp - claims.iat,
            seconds,
            "Token lifetime is {}s, expected {}s",
            claims.exp - claims.iat,
            seconds
        );
        self
    }

    fn assert_verifies_with(&self, public_key_pem: &str) -> &Self {
        let result = verify(self, public_key_pem);
        assert!(
            result.is_ok(),
            "Token should verify with the given key: {:?}",
            result.err()
        );
        self
    }

    fn assert_rejected_by(&self, public_key_pem: &str) -> &Self {
        assert!(
            verify(self, public_key_pem).is_err(),
            "Token unexpectedly verified with the given key"
        );
        self
    }
}

fn verify(token: &str, public_key_pem: &str) -> jsonwebtoken::errors::Result<()> {
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .expect("Fixture public key should parse");
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[claims(token).aud]);
    decode::<serde_json::Value>(token, &key, &validation).map(|_| ())
}

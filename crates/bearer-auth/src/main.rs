//! `mint-jwt`: prints a self-signed access token for one audience.
//!
//! Reads `BEARER_AUTH_KEY_FILE` and `BEARER_AUTH_AUDIENCE`. Logs go to
//! stderr, so stdout carries only the token.

use bearer_auth::secret::ExposeSecret;
use bearer_auth::{AuthError, MintConfig, SelfSignedJwtCredential, TokenFetcher};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "mint_jwt=info,bearer_auth=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = MintConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let credential = SelfSignedJwtCredential::from_key_file(&config.key_file).map_err(|e| {
        error!(key_file = %config.key_file.display(), "Failed to load key file: {}", e);
        e
    })?;

    let token = credential
        .fetch_auth_token(Some(&config.audience))
        .await?
        .and_then(|result| result.access_token)
        .ok_or_else(|| AuthError::Signing("no token minted".to_string()))?;

    info!(
        issuer = %credential.issuer(),
        audience = %config.audience,
        "Minted access token"
    );

    println!("{}", token.expose_secret());
    Ok(())
}

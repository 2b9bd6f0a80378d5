//! Integration tests for the caching `Authorization` middleware
//!
//! These tests drive `AuthTokenLayer` end to end over a capturing downstream
//! service, checking the fetch-or-cache protocol, header injection and error
//! propagation.

use bearer_auth::{
    AuthError, AuthOption, AuthResult, AuthTokenLayer, MemoryTokenCache, MiddlewareConfig,
    MiddlewareError, SelfSignedJwtCredential, DEFAULT_CACHE_LIFETIME,
};
use bearer_auth_test_utils::{
    test_key_json, CacheWrite, CapturingService, DownstreamError, JwtAssertions, MockFetcher,
    RecordingCache, RecordingObserver, TEST_CLIENT_EMAIL, TEST_RSA_PUBLIC_KEY_PEM,
    unverified_claims,
};
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

const SVC_URI: &str = "https://svc.example.com/v1/items";

fn marked_request() -> Result<Request<()>, anyhow::Error> {
    let mut req = Request::get(SVC_URI).body(())?;
    req.extensions_mut().insert(AuthOption::bearer());
    Ok(req)
}

fn bearer(token: &str) -> Vec<Vec<String>> {
    vec![vec![format!("Bearer {token}")]]
}

// ============================================================================
// Pass-through
// ============================================================================

/// Requests without a marker are forwarded untouched and never fetch.
#[tokio::test]
async fn test_unmarked_request_is_untouched() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = Arc::new(MockFetcher::returning_token("tok"));
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::from_arc(Arc::clone(&fetcher), MiddlewareConfig::default());

    let mut req = Request::get(SVC_URI).body(())?;
    req.headers_mut()
        .insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));

    // Act
    let response = layer.layer(downstream.clone()).oneshot(req).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetcher.call_count(), 0, "Fetcher must not be invoked");
    assert_eq!(
        downstream.authorization_headers(),
        vec![vec!["Basic dXNlcjpwYXNz".to_string()]]
    );

    Ok(())
}

/// A marker naming another mechanism is a mismatch, which also passes through.
#[tokio::test]
async fn test_mismatched_marker_is_untouched() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = Arc::new(MockFetcher::returning_token("tok"));
    let cache = Arc::new(RecordingCache::new());
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::from_arc(Arc::clone(&fetcher), MiddlewareConfig::default())
        .with_cache(Arc::clone(&cache));

    let mut req = Request::get(SVC_URI).body(())?;
    req.extensions_mut().insert(AuthOption::named("google_auth"));

    // Act
    layer.layer(downstream.clone()).oneshot(req).await?;

    // Assert
    assert_eq!(fetcher.call_count(), 0);
    assert!(cache.gets().is_empty(), "Cache must not be consulted");
    assert_eq!(downstream.authorization_headers(), vec![Vec::<String>::new()]);

    Ok(())
}

// ============================================================================
// No cache configured
// ============================================================================

/// Without a cache every marked request fetches exactly once.
#[tokio::test]
async fn test_no_cache_fetches_once_per_request() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = Arc::new(MockFetcher::returning_token("tok"));
    let observer = RecordingObserver::new();
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::from_arc(Arc::clone(&fetcher), MiddlewareConfig::default())
        .with_observer(observer.clone());
    let service = layer.layer(downstream.clone());

    // Act
    for _ in 0..3 {
        service.clone().oneshot(marked_request()?).await?;
    }

    // Assert
    assert_eq!(fetcher.call_count(), 3);
    assert_eq!(downstream.authorization_headers(), {
        let mut expected = bearer("tok");
        expected.extend(bearer("tok"));
        expected.extend(bearer("tok"));
        expected
    });
    assert!(observer.seen().is_empty(), "No cache write, no notification");

    Ok(())
}

/// A result without `access_token` degrades to an empty bearer token.
#[tokio::test]
async fn test_missing_access_token_sets_empty_bearer() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = MockFetcher::returning(AuthResult::default());
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::new(fetcher, MiddlewareConfig::default());

    // Act
    layer.layer(downstream.clone()).oneshot(marked_request()?).await?;

    // Assert
    assert_eq!(downstream.authorization_headers(), bearer(""));

    Ok(())
}

// ============================================================================
// Cache protocol
// ============================================================================

/// Prefix "p-", empty cache, fetcher returning "tok": the token is written
/// under the prefixed key for the configured lifetime and reported once.
#[tokio::test]
async fn test_cache_miss_writes_prefixed_key() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = Arc::new(MockFetcher::returning_token("tok").with_cache_key("svc-key"));
    let cache = Arc::new(RecordingCache::new());
    let observer = RecordingObserver::new();
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::from_arc(
        Arc::clone(&fetcher),
        MiddlewareConfig::default().with_prefix("p-"),
    )
    .with_cache(Arc::clone(&cache))
    .with_observer(observer.clone());

    // Act
    layer.layer(downstream.clone()).oneshot(marked_request()?).await?;

    // Assert
    assert_eq!(cache.gets(), vec!["p-svc-key".to_string()]);
    assert_eq!(
        cache.writes(),
        vec![CacheWrite {
            key: "p-svc-key".to_string(),
            value: "tok".to_string(),
            ttl: DEFAULT_CACHE_LIFETIME,
        }]
    );
    assert_eq!(
        observer.seen(),
        vec![("p-svc-key".to_string(), "tok".to_string())]
    );
    assert_eq!(downstream.authorization_headers(), bearer("tok"));
    assert_eq!(fetcher.call_count(), 1);

    Ok(())
}

/// A non-empty cached value is used without fetching or notifying.
#[tokio::test]
async fn test_cache_hit_skips_fetch() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = Arc::new(MockFetcher::returning_token("fresh").with_cache_key("svc-key"));
    let cache = Arc::new(RecordingCache::new().with_entry("p-svc-key", "cached"));
    let observer = RecordingObserver::new();
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::from_arc(
        Arc::clone(&fetcher),
        MiddlewareConfig::default().with_prefix("p-"),
    )
    .with_cache(Arc::clone(&cache))
    .with_observer(observer.clone());

    // Act
    layer.layer(downstream.clone()).oneshot(marked_request()?).await?;

    // Assert
    assert_eq!(fetcher.call_count(), 0);
    assert!(cache.writes().is_empty());
    assert!(observer.seen().is_empty());
    assert_eq!(downstream.authorization_headers(), bearer("cached"));

    Ok(())
}

/// A present-but-empty cached value counts as a miss.
#[tokio::test]
async fn test_empty_cached_value_refetches() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = Arc::new(MockFetcher::returning_token("tok").with_cache_key("svc-key"));
    let cache = Arc::new(RecordingCache::new().with_entry("svc-key", ""));
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::from_arc(Arc::clone(&fetcher), MiddlewareConfig::default())
        .with_cache(Arc::clone(&cache));

    // Act
    layer.layer(downstream.clone()).oneshot(marked_request()?).await?;

    // Assert
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(cache.writes().len(), 1);
    assert_eq!(downstream.authorization_headers(), bearer("tok"));

    Ok(())
}

/// No token means nothing is written and nobody is notified.
#[tokio::test]
async fn test_no_token_is_not_cached() -> Result<(), anyhow::Error> {
    // Arrange
    let cache = Arc::new(RecordingCache::new());
    let observer = RecordingObserver::new();
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::new(MockFetcher::returning_none(), MiddlewareConfig::default())
        .with_cache(Arc::clone(&cache))
        .with_observer(observer.clone());

    // Act
    layer.layer(downstream.clone()).oneshot(marked_request()?).await?;

    // Assert
    assert!(cache.writes().is_empty());
    assert!(observer.seen().is_empty());
    assert_eq!(downstream.authorization_headers(), bearer(""));

    Ok(())
}

/// The configured lifetime is passed through as the TTL.
#[tokio::test]
async fn test_custom_lifetime_is_ttl() -> Result<(), anyhow::Error> {
    // Arrange
    let cache = Arc::new(RecordingCache::new());
    let layer = AuthTokenLayer::new(
        MockFetcher::returning_token("tok"),
        MiddlewareConfig::default().with_lifetime(Duration::from_secs(70707)),
    )
    .with_cache(Arc::clone(&cache));

    // Act
    layer
        .layer(CapturingService::new())
        .oneshot(marked_request()?)
        .await?;

    // Assert
    let writes = cache.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].ttl, Duration::from_secs(70707));

    Ok(())
}

// ============================================================================
// Errors and downstream results
// ============================================================================

/// Fetch failures reach the caller unchanged and the request is not sent.
#[tokio::test]
async fn test_fetch_error_propagates() -> Result<(), anyhow::Error> {
    // Arrange
    let downstream = CapturingService::new();
    let layer = AuthTokenLayer::new(
        MockFetcher::failing(AuthError::Fetch("connection reset".to_string())),
        MiddlewareConfig::default(),
    )
    .with_cache(Arc::new(RecordingCache::new()));

    // Act
    let result = layer.layer(downstream.clone()).oneshot(marked_request()?).await;

    // Assert
    assert!(matches!(
        result,
        Err(MiddlewareError::Auth(AuthError::Fetch(ref msg))) if msg == "connection reset"
    ));
    assert_eq!(downstream.request_count(), 0);

    Ok(())
}

/// Cache failures are as fatal as fetch failures.
#[tokio::test]
async fn test_cache_error_propagates() -> Result<(), anyhow::Error> {
    // Arrange
    let fetcher = Arc::new(MockFetcher::returning_token("tok"));
    let layer = AuthTokenLayer::from_arc(Arc::clone(&fetcher), MiddlewareConfig::default())
        .with_cache(RecordingCache::failing(AuthError::Cache("store offline".to_string())));

    // Act
    let result = layer
        .layer(CapturingService::new())
        .oneshot(marked_request()?)
        .await;

    // Assert
    assert!(matches!(
        result,
        Err(MiddlewareError::Auth(AuthError::Cache(_)))
    ));
    assert_eq!(fetcher.call_count(), 0);

    Ok(())
}

/// Downstream responses come back unchanged.
#[tokio::test]
async fn test_downstream_response_is_unchanged() -> Result<(), anyhow::Error> {
    // Arrange
    let downstream = CapturingService::new().with_status(StatusCode::SERVICE_UNAVAILABLE);
    let layer = AuthTokenLayer::new(MockFetcher::returning_token("tok"), MiddlewareConfig::default());

    // Act
    let response = layer.layer(downstream).oneshot(marked_request()?).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body(), "ok");

    Ok(())
}

/// Downstream errors come back as `MiddlewareError::Service`.
#[tokio::test]
async fn test_downstream_error_is_wrapped() -> Result<(), anyhow::Error> {
    // Arrange
    let layer = AuthTokenLayer::new(MockFetcher::returning_token("tok"), MiddlewareConfig::default());

    // Act
    let result = layer
        .layer(CapturingService::failing("connection refused"))
        .oneshot(marked_request()?)
        .await;

    // Assert
    assert!(matches!(
        result,
        Err(MiddlewareError::Service(DownstreamError(ref msg))) if msg == "connection refused"
    ));

    Ok(())
}

// ============================================================================
// Self-signed credential behind the middleware
// ============================================================================

/// The credential mints a token for the request's origin, and the cache
/// serves it to the next request for the same origin.
#[tokio::test]
async fn test_self_signed_credential_end_to_end() -> Result<(), anyhow::Error> {
    // Arrange
    let credential = SelfSignedJwtCredential::from_json(&test_key_json())?;
    let cache = MemoryTokenCache::new();
    let downstream = CapturingService::new();
    let service = AuthTokenLayer::new(credential, MiddlewareConfig::default())
        .with_cache(cache.clone())
        .layer(downstream.clone());

    // Act
    service.clone().oneshot(marked_request()?).await?;
    service.clone().oneshot(marked_request()?).await?;

    // Assert
    let headers = downstream.authorization_headers();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0], headers[1], "Second request should hit the cache");

    let token = headers[0][0]
        .strip_prefix("Bearer ")
        .expect("Header should carry a bearer token");
    token
        .assert_valid_jwt()
        .assert_issued_by(TEST_CLIENT_EMAIL)
        .assert_for_audience("https://svc.example.com/")
        .assert_lifetime(3600)
        .assert_verifies_with(TEST_RSA_PUBLIC_KEY_PEM);

    assert_eq!(cache.len().await, 1);

    Ok(())
}

/// Concurrent requests to different services through one shared credential
/// each get a token for their own audience.
#[tokio::test]
async fn test_concurrent_audiences_do_not_interleave() -> Result<(), anyhow::Error> {
    // Arrange
    let credential = Arc::new(SelfSignedJwtCredential::from_json(&test_key_json())?);
    let downstream = CapturingService::new();
    let service = AuthTokenLayer::from_arc(credential, MiddlewareConfig::default())
        .with_cache(MemoryTokenCache::new())
        .layer(downstream.clone());

    let audiences: Vec<String> = (0..8)
        .map(|i| format!("https://svc-{i}.example.com/"))
        .collect();

    // Act
    let mut tasks = Vec::new();
    for audience in &audiences {
        let mut req = Request::get(format!("{audience}v1/items")).body(())?;
        req.extensions_mut().insert(AuthOption::bearer());
        tasks.push(tokio::spawn(service.clone().oneshot(req)));
    }
    for task in tasks {
        task.await??;
    }

    // Assert
    let mut seen: Vec<String> = downstream
        .authorization_headers()
        .into_iter()
        .map(|values| {
            let token = values[0].strip_prefix("Bearer ").unwrap().to_string();
            token.assert_valid_jwt();
            unverified_claims(&token)["aud"].as_str().unwrap().to_string()
        })
        .collect();
    seen.sort();

    let mut expected = audiences.clone();
    expected.sort();
    assert_eq!(seen, expected);

    Ok(())
}

//! Capturing downstream service.
//!
//! Stands in for the HTTP client at the bottom of a middleware stack.

use http::header::AUTHORIZATION;
use http::{Request, Response, StatusCode};
use std::future::{ready, Ready};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use thiserror::Error;
use tower::Service;

/// Error returned by a [`CapturingService`] configured to fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("downstream failed: {0}")]
pub struct DownstreamError(pub String);

/// A `tower` service that records the `Authorization` headers of every
/// request it receives and answers with a fixed response.
///
/// Clones share the record.
#[derive(Clone)]
pub struct CapturingService {
    requests: Arc<Mutex<Vec<Vec<String>>>>,
    status: StatusCode,
    failure: Option<DownstreamError>,
}

impl Default for CapturingService {
    fn default() -> Self {
        Self {
            requests: Arc::default(),
            status: StatusCode::OK,
            failure: None,
        }
    }
}

impl CapturingService {
    /// Answers every request with `200 OK` and body `ok`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request with `status`.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Fails every request with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(DownstreamError(message.to_string())),
            ..Self::default()
        }
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `Authorization` values of each received request, in order.
    pub fn authorization_headers(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

impl<B> Service<Request<B>> for CapturingService {
    type Response = Response<String>;
    type Error = DownstreamError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let values = req
            .headers()
            .get_all(AUTHORIZATION)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        self.requests.lock().unwrap().push(values);

        if let Some(error) = &self.failure {
            return ready(Err(error.clone()));
        }

        let response = Response::builder()
            .status(self.status)
            .body("ok".to_string())
            .unwrap();
        ready(Ok(response))
    }
}

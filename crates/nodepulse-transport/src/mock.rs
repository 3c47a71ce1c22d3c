// ============================================
// File: crates/nodepulse-transport/src/mock.rs
// ============================================
//! # Mock HTTP Transport
//!
//! ## Creation Reason
//! Provides a scripted transport for testing the agent without a network
//! or the real node service.
//!
//! ## Main Functionality
//! - Responses scripted per (method, URL suffix), consumed FIFO
//! - Optional fallback per route once the queue is drained
//! - Recorded call log for verification
//!
//! ## Usage in Tests
//! ```ignore
//! use nodepulse_transport::mock::MockTransport;
//! use nodepulse_transport::traits::{HttpRequest, HttpResponse, HttpTransport, Method};
//!
//! #[tokio::test]
//! async fn test_with_mock_transport() {
//!     let transport = MockTransport::new();
//!     transport.respond(Method::Post, "/ping", HttpResponse::new(200, "{}"));
//!
//!     let response = transport.send(HttpRequest::post("https://x/nodes/a/ping")).await.unwrap();
//!     assert!(response.is_success());
//!     assert_eq!(transport.calls_matching(Method::Post, "/ping"), 1);
//! }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Routes match by URL suffix; register the most specific suffix you need
//! - When several suffixes match, the longest wins
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use crate::traits::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Scripted outcome of one call.
type Outcome = std::result::Result<HttpResponse, String>;

#[derive(Default)]
struct Route {
    queue: VecDeque<Outcome>,
    fallback: Option<Outcome>,
}

/// Scripted transport for testing.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Route>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for requests whose URL ends with `suffix`.
    pub fn respond(&self, method: Method, suffix: &str, response: HttpResponse) {
        self.push(method, suffix, Ok(response));
    }

    /// Queues a transport failure for requests whose URL ends with `suffix`.
    pub fn fail(&self, method: Method, suffix: &str, reason: &str) {
        self.push(method, suffix, Err(reason.to_string()));
    }

    /// Sets the response returned once the queue for `suffix` is empty.
    pub fn respond_always(&self, method: Method, suffix: &str, response: HttpResponse) {
        self.routes
            .lock()
            .entry((method, suffix.to_string()))
            .or_default()
            .fallback = Some(Ok(response));
    }

    /// Sets the failure returned once the queue for `suffix` is empty.
    pub fn fail_always(&self, method: Method, suffix: &str, reason: &str) {
        self.routes
            .lock()
            .entry((method, suffix.to_string()))
            .or_default()
            .fallback = Some(Err(reason.to_string()));
    }

    /// Returns a copy of every request seen so far.
    #[must_use]
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().clone()
    }

    /// Counts recorded requests matching `method` and URL `suffix`.
    #[must_use]
    pub fn calls_matching(&self, method: Method, suffix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .count()
    }

    fn push(&self, method: Method, suffix: &str, outcome: Outcome) {
        self.routes
            .lock()
            .entry((method, suffix.to_string()))
            .or_default()
            .queue
            .push_back(outcome);
    }

    fn next_outcome(&self, request: &HttpRequest) -> Option<Outcome> {
        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .filter(|((method, suffix), _)| {
                *method == request.method && request.url.ends_with(suffix.as_str())
            })
            .max_by_key(|((_, suffix), _)| suffix.len())
            .map(|(_, route)| route)?;
        route.queue.pop_front().or_else(|| route.fallback.clone())
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.calls.lock().push(request.clone());

        match self.next_outcome(&request) {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(TransportError::request(&request.url, reason)),
            None => Err(TransportError::NoScriptedResponse {
                method: request.method.to_string(),
                url: request.url,
            }),
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("routes", &self.routes.lock().len())
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

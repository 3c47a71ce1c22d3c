// ============================================
// File: crates/nodepulse-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the "send request, get response or error" capability the agent
//! depends on, so its lifecycle can be driven against a scripted fake.
//!
//! ## Main Functionality
//! - `HttpTransport`: async request/response interface
//! - `HttpRequest`: method, URL, headers, JSON body and proxy route
//! - `HttpResponse`: status code plus raw body
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync for use across node tasks
//! - A non-2xx status is NOT a transport error; callers classify it
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Result, TransportError};

// ============================================
// Method
// ============================================

/// HTTP methods used against the node service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

// ============================================
// HttpRequest
// ============================================

/// A single outgoing HTTP request.
///
/// # Example
/// ```
/// use nodepulse_transport::traits::{HttpRequest, Method};
///
/// let request = HttpRequest::post("https://api.example.com/nodes/n1/ping")
///     .header("Authorization", "Bearer t")
///     .via_proxy(Some("http://127.0.0.1:8080".to_string()));
/// assert_eq!(request.method, Method::Post);
/// assert_eq!(request.header_value("authorization"), Some("Bearer t"));
/// ```
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Optional JSON body.
    pub json_body: Option<serde_json::Value>,
    /// Optional HTTP(S) proxy URL to route through.
    pub proxy: Option<String>,
}

impl HttpRequest {
    /// Creates a request with no headers, body or proxy.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            json_body: None,
            proxy: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json_body = Some(body);
        self
    }

    /// Routes the request through `proxy` when set.
    #[must_use]
    pub fn via_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Looks up a header value (case-insensitive name).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for HttpRequest {
    // Header values are left out, they carry bearer tokens.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &names)
            .field("has_body", &self.json_body.is_some())
            .field("proxied", &self.proxy.is_some())
            .finish()
    }
}

// ============================================
// HttpResponse
// ============================================

/// Status code and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx status codes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    /// Returns `TransportError::Decode` if the body is not valid for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::decode(e.to_string()))
    }
}

// ============================================
// HttpTransport Trait
// ============================================

/// Abstract interface for performing HTTP calls.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to allow sharing across
/// every node's lifecycle and heartbeat task.
///
/// # Example
/// ```ignore
/// async fn ping<T: HttpTransport>(transport: &T, url: &str) -> Result<bool> {
///     let response = transport.send(HttpRequest::post(url)).await?;
///     Ok(response.is_success())
/// }
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs the request and returns the status and body.
    ///
    /// # Errors
    /// Returns error if no response was obtained at all.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

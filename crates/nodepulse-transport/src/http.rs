// ============================================
// File: crates/nodepulse-transport/src/http.rs
// ============================================
//! # Reqwest Transport Implementation
//!
//! ## Creation Reason
//! Production implementation of `HttpTransport` on top of reqwest.
//!
//! ## Main Functionality
//! - One `reqwest::Client` per distinct proxy route, built lazily
//! - Shared request timeout
//! - Mapping of reqwest failures onto `TransportError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - reqwest binds proxies at client build time, hence the client cache
//! - Clients are cheap to clone (internally Arc'd)
//! - The cache never shrinks; routes come from static configuration
//!
//! ## Last Modified
//! v0.1.0 - Initial reqwest transport

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Cache key for requests that go out directly.
const DIRECT_ROUTE: &str = "";

/// HTTP transport backed by reqwest.
pub struct ReqwestTransport {
    /// Per-request timeout applied to every client.
    timeout: Duration,
    /// Clients keyed by proxy URL (`DIRECT_ROUTE` for no proxy).
    clients: DashMap<String, Client>,
}

impl ReqwestTransport {
    /// Creates a transport with the given request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: DashMap::new(),
        }
    }

    /// Returns the number of cached clients.
    #[must_use]
    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }

    /// Returns the client for `proxy`, building it on first use.
    fn client_for(&self, proxy: Option<&str>) -> Result<Client> {
        let key = proxy.unwrap_or(DIRECT_ROUTE);
        if let Some(client) = self.clients.get(key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(route) = proxy {
            let proxy = reqwest::Proxy::all(route)
                .map_err(|e| TransportError::invalid_proxy(route, e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| TransportError::ClientBuild {
            reason: e.to_string(),
        })?;

        debug!(proxied = proxy.is_some(), "Built HTTP client");
        Ok(self
            .clients
            .entry(key.to_string())
            .or_insert(client)
            .clone())
    }

    fn map_error(url: &str, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else {
            TransportError::request(url, err.to_string())
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let client = self.client_for(request.proxy.as_deref())?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        trace!(method = %request.method, url = %request.url, "Sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&request.url, &e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(&request.url, &e))?;

        trace!(url = %request.url, status, "Received response");
        Ok(HttpResponse { status, body })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("timeout", &self.timeout)
            .field("cached_clients", &self.cached_clients())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_cache_per_route() {
        let transport = ReqwestTransport::default();

        transport.client_for(None).unwrap();
        transport.client_for(None).unwrap();
        assert_eq!(transport.cached_clients(), 1);

        transport.client_for(Some("http://127.0.0.1:8080")).unwrap();
        assert_eq!(transport.cached_clients(), 2);
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let transport = ReqwestTransport::default();
        let result = transport.client_for(Some("http://[::1"));
        assert!(matches!(result, Err(TransportError::InvalidProxy { .. })));
        assert_eq!(transport.cached_clients(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(2));
        // Port 9 on localhost is discard; nothing listens there in CI.
        let result = transport.send(HttpRequest::get("http://127.0.0.1:9/")).await;
        assert!(matches!(
            result,
            Err(TransportError::Request { .. } | TransportError::Timeout { .. })
        ));
    }
}

// ============================================
// File: crates/nodepulse-agent/src/management/client.rs
// ============================================
//! # Node Service API Client
//!
//! ## Main Functionality
//! - `register`: bind the node's hardware id (and IP) to the account
//! - `start_session`: open the node's earning session
//! - `ping`: one heartbeat, sent with the fixed extension `origin`
//! - `fetch_ip`: public IP as seen through the node's proxy
//!
//! ## ⚠️ Important Note for Next Developer
//! - A non-2xx status is an `ApiError::HttpStatus`, for every call
//! - An empty body is accepted and read as JSON `null`
//! - Never log request headers, they carry the bearer token
//!
//! ## Last Modified
//! v0.1.0 - Initial API client

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use nodepulse_transport::traits::{HttpRequest, HttpResponse, HttpTransport};

use super::config::ApiConfig;
use super::models::{IpResponse, PingResponse, RegisterRequest};
use crate::error::ApiError;
use crate::services::NodeTarget;

/// Client for the node registration service.
///
/// Each method performs exactly one HTTP call through the injected
/// transport; retry policy lives in the lifecycle and scheduler.
pub struct NodeApiClient {
    config: ApiConfig,
    transport: Arc<dyn HttpTransport>,
}

impl NodeApiClient {
    /// Creates a client over `transport`.
    pub fn new(config: ApiConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn node_url(&self, target: &NodeTarget, suffix: &str) -> String {
        format!("{}/nodes/{}{}", self.config.base(), target.node_id, suffix)
    }

    fn authorized(&self, request: HttpRequest, target: &NodeTarget) -> HttpRequest {
        request
            .header("Authorization", target.token.authorization_value())
            .via_proxy(target.proxy.clone())
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ApiError::http_status(response.status, &response.body));
        }
        Ok(response)
    }

    /// Decodes a JSON body; an empty body reads as JSON `null`.
    fn decode<T: DeserializeOwned>(
        response: &HttpResponse,
        context: &'static str,
    ) -> Result<T, ApiError> {
        let body = response.body.trim();
        let body = if body.is_empty() { "null" } else { body };
        serde_json::from_str(body).map_err(|e| ApiError::parse(context, e.to_string()))
    }

    /// Registers the node: `POST /nodes/{nodeId}`.
    pub async fn register(&self, target: &NodeTarget) -> Result<serde_json::Value, ApiError> {
        let body = RegisterRequest {
            ip_address: target.ip_address.clone(),
            hardware_id: target.hardware_id.clone(),
        };
        let body = serde_json::to_value(&body).map_err(|e| ApiError::parse("register", e.to_string()))?;
        let request = self.authorized(
            HttpRequest::post(self.node_url(target, ""))
                .header("Content-Type", "application/json")
                .json(body),
            target,
        );

        info!(node_id = %target.node_id, "Registering node");
        let response = self.execute(request).await?;
        let data: serde_json::Value = Self::decode(&response, "register")?;
        debug!(node_id = %target.node_id, response = %data, "Registration response");
        Ok(data)
    }

    /// Opens a session: `POST /nodes/{nodeId}/start-session`.
    pub async fn start_session(&self, target: &NodeTarget) -> Result<serde_json::Value, ApiError> {
        let request = self.authorized(
            HttpRequest::post(self.node_url(target, "/start-session")),
            target,
        );

        info!(node_id = %target.node_id, "Starting session");
        let response = self.execute(request).await?;
        let data: serde_json::Value = Self::decode(&response, "start-session")?;
        debug!(node_id = %target.node_id, response = %data, "Start session response");
        Ok(data)
    }

    /// Sends one heartbeat: `POST /nodes/{nodeId}/ping`.
    pub async fn ping(&self, target: &NodeTarget) -> Result<PingResponse, ApiError> {
        let request = self.authorized(
            HttpRequest::post(self.node_url(target, "/ping")).header("origin", &self.config.origin),
            target,
        );

        debug!(node_id = %target.node_id, "Pinging node");
        let response = self.execute(request).await?;
        let data: Option<PingResponse> = Self::decode(&response, "ping")?;
        Ok(data.unwrap_or_default())
    }

    /// Resolves the public IP seen through `proxy`.
    pub async fn fetch_ip(&self, proxy: Option<&str>) -> Result<String, ApiError> {
        let request =
            HttpRequest::get(&self.config.ip_service_url).via_proxy(proxy.map(str::to_string));

        let response = self.execute(request).await?;
        let data: IpResponse = Self::decode(&response, "ip lookup")?;
        Ok(data.ip)
    }

    /// Returns the API configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

impl std::fmt::Debug for NodeApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeApiClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodepulse_common::types::{BearerToken, NodeId};
    use nodepulse_transport::mock::MockTransport;
    use nodepulse_transport::traits::{HttpResponse, Method};

    fn target(proxy: Option<&str>, ip: Option<&str>) -> NodeTarget {
        NodeTarget {
            node_id: NodeId::new("node-1").unwrap(),
            hardware_id: "hw-1".to_string(),
            token: BearerToken::new("token-abcd").unwrap(),
            proxy: proxy.map(str::to_string),
            ip_address: ip.map(str::to_string),
        }
    }

    fn client(transport: &Arc<MockTransport>) -> NodeApiClient {
        let config = ApiConfig {
            base_url: "https://gw.test/api/v1/".to_string(),
            ip_service_url: "https://ip.test".to_string(),
            ..ApiConfig::default()
        };
        NodeApiClient::new(config, Arc::clone(transport) as Arc<dyn HttpTransport>)
    }

    #[tokio::test]
    async fn test_register_request() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Post, "/nodes/node-1", HttpResponse::new(200, r#"{"pubKey":"node-1"}"#));

        let client = client(&transport);
        let data = client.register(&target(Some("http://p:1"), Some("1.2.3.4"))).await.unwrap();
        assert_eq!(data["pubKey"], "node-1");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.url, "https://gw.test/api/v1/nodes/node-1");
        assert_eq!(call.header_value("authorization"), Some("Bearer token-abcd"));
        assert_eq!(call.header_value("content-type"), Some("application/json"));
        assert_eq!(call.proxy.as_deref(), Some("http://p:1"));
        assert_eq!(
            call.json_body,
            Some(serde_json::json!({ "ipAddress": "1.2.3.4", "hardwareId": "hw-1" }))
        );
    }

    #[tokio::test]
    async fn test_ping_sends_origin() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Post, "/ping", HttpResponse::new(200, r#"{"status":"ok"}"#));

        let response = client(&transport).ping(&target(None, None)).await.unwrap();
        assert_eq!(response.status_or_default(), "ok");

        let call = &transport.calls()[0];
        assert_eq!(call.url, "https://gw.test/api/v1/nodes/node-1/ping");
        assert_eq!(
            call.header_value("origin"),
            Some("chrome-extension://pljbjcehnhcnofmkdbjolghdcjnmekia")
        );
        assert!(call.proxy.is_none());
        assert!(call.json_body.is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Post, "/start-session", HttpResponse::new(401, "unauthorized"));

        let err = client(&transport).start_session(&target(None, None)).await.unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Post, "/ping", HttpResponse::new(200, "<html>oops</html>"));

        let err = client(&transport).ping(&target(None, None)).await.unwrap_err();
        assert!(matches!(err, ApiError::Parse { context: "ping", .. }));
    }

    #[tokio::test]
    async fn test_empty_body_accepted() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Post, "/start-session", HttpResponse::new(204, ""));
        transport.respond(Method::Post, "/ping", HttpResponse::new(200, ""));

        let client = client(&transport);
        assert!(client.start_session(&target(None, None)).await.unwrap().is_null());
        assert_eq!(client.ping(&target(None, None)).await.unwrap().status_or_default(), "No status");
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(Method::Post, "/nodes/node-1", "proxy tunnel refused");

        let err = client(&transport).register(&target(None, None)).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_fetch_ip_through_proxy() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(Method::Get, "ip.test", HttpResponse::new(200, r#"{"ip":"8.8.4.4"}"#));

        let ip = client(&transport).fetch_ip(Some("http://p:1")).await.unwrap();
        assert_eq!(ip, "8.8.4.4");
        assert_eq!(transport.calls()[0].proxy.as_deref(), Some("http://p:1"));
    }
}

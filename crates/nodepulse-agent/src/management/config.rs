// ============================================
// File: crates/nodepulse-agent/src/management/config.rs
// ============================================
//! # Node API Configuration

use serde::{Deserialize, Serialize};

/// Node service endpoints and request settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Gateway API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// External endpoint returning `{ "ip": "..." }`.
    #[serde(default = "default_ip_service_url")]
    pub ip_service_url: String,

    /// Value of the `origin` header sent with pings.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://gateway-run.bls.dev/api/v1".to_string()
}

fn default_ip_service_url() -> String {
    "https://tight-block-2413.txlabs.workers.dev".to_string()
}

fn default_origin() -> String {
    "chrome-extension://pljbjcehnhcnofmkdbjolghdcjnmekia".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ip_service_url: default_ip_service_url(),
            origin: default_origin(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("base_url cannot be empty".to_string());
        }
        if self.ip_service_url.trim().is_empty() {
            return Err("ip_service_url cannot be empty".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

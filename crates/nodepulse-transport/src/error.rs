// ============================================
// File: crates/nodepulse-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines the failures an HTTP exchange can produce before the caller
//! ever sees a status code, plus body decoding failures.
//!
//! ## Error Categories
//! 1. **Network Errors**: connect, DNS, TLS and proxy tunnel failures
//! 2. **Configuration Errors**: proxy URLs reqwest refuses, client build
//! 3. **Decoding Errors**: a body that is not the JSON we expected
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every variant is retried by the caller's own policy, never here
//! - Never put request headers in an error (they carry bearer tokens)
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Network Errors
    // ========================================

    /// Request could not be completed (connect, DNS, TLS, proxy).
    #[error("Request to {url} failed: {reason}")]
    Request {
        /// Target URL
        url: String,
        /// Why the request failed
        reason: String,
    },

    /// Request exceeded the client timeout.
    #[error("Request to {url} timed out")]
    Timeout {
        /// Target URL
        url: String,
    },

    // ========================================
    // Configuration Errors
    // ========================================

    /// Proxy route could not be parsed.
    #[error("Invalid proxy '{proxy}': {reason}")]
    InvalidProxy {
        /// The proxy URL as configured
        proxy: String,
        /// Why it was rejected
        reason: String,
    },

    /// HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Why the builder failed
        reason: String,
    },

    // ========================================
    // Decoding Errors
    // ========================================

    /// Response body was not valid for the expected type.
    #[error("Failed to decode response body: {reason}")]
    Decode {
        /// Decoder message
        reason: String,
    },

    /// A scripted transport had nothing queued for this request.
    #[cfg(any(test, feature = "mock"))]
    #[error("No scripted response for {method} {url}")]
    NoScriptedResponse {
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },
}

impl TransportError {
    /// Creates a `Request` error.
    pub fn request(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Request {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidProxy` error.
    pub fn invalid_proxy(proxy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProxy {
            proxy: proxy.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Decode` error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::request("https://example.com/ping", "connection refused");
        assert!(err.to_string().contains("https://example.com/ping"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_proxy_error_names_route() {
        let err = TransportError::invalid_proxy("http://[::1", "invalid IPv6 address");
        assert_eq!(
            err.to_string(),
            "Invalid proxy 'http://[::1': invalid IPv6 address"
        );
    }
}

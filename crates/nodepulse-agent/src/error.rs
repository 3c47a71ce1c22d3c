// ============================================
// File: crates/nodepulse-agent/src/error.rs
// ============================================
//! # Agent Error Types
//!
//! ## Main Functionality
//! - `ApiError`: outcome of a single node-service call (transport, status, parse)
//! - `AgentError`: configuration and startup failures of the agent itself
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ApiError` never escapes a node's lifecycle or heartbeat task
//! - Response bodies are truncated before they land in an error
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use nodepulse_transport::error::TransportError;

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Longest response body snippet kept in an `HttpStatus` error.
const MAX_ERROR_BODY_CHARS: usize = 200;

// ============================================
// ApiError
// ============================================

/// Failure of one call against the node service.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network, DNS or proxy failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered with a non-success status.
    #[error("HTTP error! status: {status}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Leading part of the response body.
        body: String,
    },

    /// The response body could not be parsed.
    #[error("Malformed {context} response: {reason}")]
    Parse {
        /// Which call produced the body.
        context: &'static str,
        /// Decoder message.
        reason: String,
    },
}

impl ApiError {
    /// Creates an `HttpStatus` error, truncating the body.
    pub fn http_status(status: u16, body: &str) -> Self {
        Self::HttpStatus {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }

    /// Creates a `Parse` error.
    pub fn parse(context: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            context,
            reason: reason.into(),
        }
    }
}

// ============================================
// AgentError
// ============================================

/// Agent error types.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Agent failed to start: {reason}")]
    StartupFailed {
        reason: String,
    },
}

impl AgentError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }
}

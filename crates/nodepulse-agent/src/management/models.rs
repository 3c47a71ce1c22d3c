//! ============================================
//! File: crates/nodepulse-agent/src/management/models.rs
//! ============================================
//! Purpose: Node service request/response bodies
//!
//! Main Data Structures:
//!   - RegisterRequest: body of `POST /nodes/{nodeId}`
//!   - PingResponse: body of `POST /nodes/{nodeId}/ping`
//!   - IpResponse: body of the IP lookup endpoint
//!
//! ⚠️ Important Note for Next Developer:
//!   - The service speaks camelCase; keep the serde renames
//!   - `ipAddress` is serialized as `null` (not omitted) outside proxy mode
//! ============================================

use serde::{Deserialize, Serialize};

/// Body of the node registration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Public IP of the node, when known.
    pub ip_address: Option<String>,
    /// Hardware fingerprint of the node.
    pub hardware_id: String,
}

/// Ping response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PingResponse {
    /// Liveness status reported by the service (e.g. "ok").
    #[serde(default)]
    pub status: Option<String>,
}

impl PingResponse {
    /// Status for display; the service sometimes omits it.
    #[must_use]
    pub fn status_or_default(&self) -> &str {
        self.status.as_deref().unwrap_or("No status")
    }
}

/// IP lookup response.
#[derive(Debug, Clone, Deserialize)]
pub struct IpResponse {
    /// Public IP as seen by the lookup service.
    pub ip: String,
}

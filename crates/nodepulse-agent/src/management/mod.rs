// ============================================
// File: crates/nodepulse-agent/src/management/mod.rs
// ============================================
//! # Node Service Module
//!
//! ## Creation Reason
//! Provides communication with the remote node-registration service and
//! the status events emitted while talking to it.
//!
//! ## Main Functionality
//! - `NodeApiClient`: one method per service call (register, start
//!   session, ping, IP lookup)
//! - `ApiConfig`: endpoints, ping origin, request timeout
//! - `StatusEventSender` / `StatusReporter`: structured status events
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Management Module                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │  Lifecycle   │  │  Heartbeat   │  │  Status          │  │
//! │  │  (handshake) │  │  (pings)     │  │  Reporter        │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────────┘  │
//! │         │                 │                                 │
//! │         └────────┬────────┘                                 │
//! │                  ▼                                          │
//! │         ┌──────────────────┐                                │
//! │         │  NodeApiClient   │                                │
//! │         │ (Bearer + proxy) │                                │
//! │         └────────┬─────────┘                                │
//! │                  │                                          │
//! └──────────────────┼──────────────────────────────────────────┘
//!                    ▼
//!           HttpTransport (reqwest)
//! ```
//!
//! ## Service Calls
//! ```text
//! POST {base}/nodes/{nodeId}                { ipAddress, hardwareId }
//! POST {base}/nodes/{nodeId}/start-session
//! POST {base}/nodes/{nodeId}/ping           origin: <extension origin>
//! GET  {ip_service_url}                     -> { ip }
//!
//! All node calls carry: Authorization: Bearer <account token>
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial node service module

pub mod client;
pub mod config;
pub mod models;
pub mod reporter;

pub use client::NodeApiClient;
pub use config::ApiConfig;
pub use reporter::{NodePhase, StatusEvent, StatusEventSender, StatusReporter};

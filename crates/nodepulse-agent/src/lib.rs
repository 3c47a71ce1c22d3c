// ============================================
// File: crates/nodepulse-agent/src/lib.rs
// ============================================
//! # Nodepulse Agent Library
//!
//! ## Creation Reason
//! Keeps a fleet of nodes, spread over several accounts, registered and
//! pinging against the node service.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Agent configuration (TOML + legacy JSON accounts)
//! - [`agent`]: Orchestration, dispatch and supervision
//! - [`services`]: Per-node control flow
//!   - [`services::registry`]: Concurrency guard and timers
//!   - [`services::lifecycle`]: Handshake state machine
//!   - [`services::heartbeat`]: Recurring pings
//! - [`management`]: Node service API client and status events
//! - [`error`]: Agent-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Nodepulse Agent                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐  │
//! │  │   Config    │────►│    Agent    │────►│   Dispatcher    │  │
//! │  │   Loader    │     │ Orchestrator│     │                 │  │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘  │
//! │                             │                     │           │
//! │         ┌───────────────────┼───────────────────┬─┘           │
//! │         ▼                   ▼                   ▼             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     │
//! │  │  Registry   │     │  Lifecycle  │     │  Heartbeat  │     │
//! │  └─────────────┘     └─────────────┘     └─────────────┘     │
//! │                                                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │                     Transport Layer                           │
//! │  ┌─────────────────────┐     ┌─────────────────────────────┐ │
//! │  │   NodeApiClient     │────►│  HttpTransport (reqwest)    │ │
//! │  └─────────────────────┘     └─────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Node Flow
//! ```text
//! register → start-session → ping → every 120s: ping
//!     │ error                          │ 3 errors
//!     ▼                                ▼
//! wait 240s, retry               wait 30s, full restart
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - A node is never handshaking twice at the same time
//! - Each node has at most one heartbeat timer
//!
//! ## Last Modified
//! v0.1.0 - Initial agent library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod error;
pub mod management;
pub mod services;

// Re-export primary types
pub use agent::Agent;
pub use config::AgentConfig;
pub use error::{AgentError, Result};

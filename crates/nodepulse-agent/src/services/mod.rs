// ============================================
// File: crates/nodepulse-agent/src/services/mod.rs
// ============================================
//! # Agent Services
//!
//! ## Creation Reason
//! Holds the per-node control flow of the agent, separated from
//! configuration, HTTP and the CLI.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`registry`]: Concurrency guard and per-node runtime state
//! - [`lifecycle`]: Handshake state machine with fixed-delay retry
//! - [`heartbeat`]: Recurring ping per node, restart on exhaustion
//! - [`dispatch`]: Commands accepted by the agent's dispatcher
//! - [`target`]: Account/node pair as seen by a service call
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │   DispatchCommand ──► ┌─────────────────┐                   │
//! │                       │  NodeLifecycle  │                   │
//! │                       │  - try_acquire  │                   │
//! │                       │  - handshake    │                   │
//! │                       │  - backoff loop │                   │
//! │                       └────────┬────────┘                   │
//! │                                │ schedule                   │
//! │                                ▼                            │
//! │  ┌─────────────────┐   ┌─────────────────────────────────┐ │
//! │  │  NodeRegistry   │◄──│      HeartbeatScheduler         │ │
//! │  │  - guard        │   │  - one task per node            │ │
//! │  │  - timers       │   │  - error counting               │ │
//! │  │  - ping errors  │   │  - RestartAfter on exhaustion ──┼─┼─► DispatchCommand
//! │  └─────────────────┘   └─────────────────────────────────┘ │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only the registry mutates `active` and timer state
//! - Restarts are messages, never direct calls into the lifecycle
//! - Thread-safe by design (Send + Sync)
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod dispatch;
pub mod heartbeat;
pub mod lifecycle;
pub mod registry;
pub mod target;

// Re-export primary types
pub use dispatch::{command_channel, CommandReceiver, CommandSender, DispatchCommand};
pub use heartbeat::{HeartbeatScheduler, HeartbeatSettings, TickOutcome};
pub use lifecycle::{DriveOutcome, HandshakeError, HandshakeStep, LifecycleState, NodeLifecycle};
pub use registry::{NodeLease, NodeRegistry, TimerHandle};
pub use target::{targets_from_config, NodeTarget};

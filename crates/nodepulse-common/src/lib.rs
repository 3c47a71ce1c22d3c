// ============================================
// File: crates/nodepulse-common/src/lib.rs
// ============================================
//! # nodepulse Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides the foundational types of the keep-alive agent, so identifiers
//! and timestamps look the same in config, services and status events.
//!
//! ## Main Functionality
//! - [`types`]: Node identifiers and bearer credentials
//! - [`time`]: Unix timestamps for status events
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               nodepulse-agent                       │
//! │                 │          │                        │
//! │                 ▼          ▼                        │
//! │   nodepulse-transport   nodepulse-common  ◄── here  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - `BearerToken` must never leak through `Debug` or `Display`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use time::Timestamp;
pub use types::{BearerToken, NodeId};

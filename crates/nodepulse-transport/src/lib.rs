// ============================================
// File: crates/nodepulse-transport/src/lib.rs
// ============================================
//! # nodepulse Transport - HTTP Capability Layer
//!
//! ## Creation Reason
//! Isolates the HTTP exchange behind a trait so the keep-alive agent deals
//! only in requests, status codes and bodies.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `HttpTransport` trait and request/response types
//! - [`http`]: reqwest implementation with per-proxy clients
//! - [`mock`]: scripted transport (feature `mock`)
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               nodepulse-agent                       │
//! │                    │                                │
//! │                    ▼                                │
//! │            nodepulse-transport  ◄── You are here    │
//! │                    │                                │
//! │                    ▼                                │
//! │             reqwest / proxies                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always depend on the trait, not on `ReqwestTransport`
//! - Mock implementation available with `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use http::ReqwestTransport;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
pub use traits::{HttpRequest, HttpResponse, HttpTransport, Method};

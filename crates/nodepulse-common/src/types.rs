// ============================================
// File: crates/nodepulse-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Main Functionality
//! - `NodeId`: Unique key of a registered node
//! - `BearerToken`: Opaque per-account credential, masked and zeroized
//!
//! ## ⚠️ Important Note for Next Developer
//! - `NodeId` is the key of every registry map - keep `Hash`/`Eq` cheap
//! - `BearerToken` implements `Zeroize` and a manual `Drop`
//! - Never add a `Display` that prints the raw token
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CommonError;

// ============================================
// NodeId
// ============================================

/// Identifier of a node registered with the remote service.
///
/// Cheap to clone (shared string), non-empty and free of `/` so it can be
/// spliced into a URL path.
///
/// # Example
/// ```
/// use nodepulse_common::types::NodeId;
///
/// let id: NodeId = "12D3KooWabc".parse().unwrap();
/// assert_eq!(id.as_str(), "12D3KooWabc");
/// assert!("".parse::<NodeId>().is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Creates a `NodeId`, rejecting empty values and path separators.
    ///
    /// # Errors
    /// Returns `CommonError::InvalidInput` if the id is empty, contains
    /// whitespace or contains `/`.
    pub fn new(value: impl AsRef<str>) -> Result<Self, CommonError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(CommonError::invalid_input("node_id", "cannot be empty"));
        }
        if value.contains('/') || value.chars().any(char::is_whitespace) {
            return Err(CommonError::invalid_input(
                "node_id",
                "cannot contain '/' or whitespace",
            ));
        }
        Ok(Self(Arc::from(value)))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0.to_string()
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================
// BearerToken
// ============================================

/// Number of trailing characters shown when a token is printed.
const VISIBLE_TOKEN_CHARS: usize = 4;

/// Bearer credential of an account.
///
/// # Security Properties
/// - `Debug` and `Display` only show the last 4 characters
/// - Implements `Zeroize`, manual `Drop` wipes the buffer
/// - Does NOT implement `Serialize` so it cannot be echoed back by accident
#[derive(Clone, PartialEq, Eq, Zeroize, Deserialize)]
#[serde(try_from = "String")]
pub struct BearerToken(String);

impl Drop for BearerToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl BearerToken {
    /// Creates a token, rejecting empty values.
    ///
    /// # Errors
    /// Returns `CommonError::InvalidInput` if the token is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, CommonError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CommonError::invalid_input("token", "cannot be empty"));
        }
        Ok(Self(value))
    }

    /// Returns the raw token for building an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `Bearer <token>`.
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Returns the masked form used in logs and CLI output.
    #[must_use]
    pub fn masked(&self) -> String {
        let count = self.0.chars().count();
        if count <= VISIBLE_TOKEN_CHARS {
            return "****".to_string();
        }
        let tail: String = self.0.chars().skip(count - VISIBLE_TOKEN_CHARS).collect();
        format!("****{tail}")
    }
}

impl TryFrom<String> for BearerToken {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken({})", self.masked())
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

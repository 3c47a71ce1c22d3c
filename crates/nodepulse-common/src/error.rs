// ============================================
// File: crates/nodepulse-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Main Functionality
//! - `CommonError`: Base error enum for identifier and input validation
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include bearer tokens in error messages
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Common error types shared across nodepulse crates.
///
/// # Example
/// ```
/// use nodepulse_common::error::{CommonError, Result};
///
/// fn validate_input(value: &str) -> Result<()> {
///     if value.is_empty() {
///         return Err(CommonError::invalid_input("node_id", "cannot be empty"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_input("node_id", "cannot be empty");
        assert!(err.to_string().contains("node_id"));
        assert!(err.to_string().contains("cannot be empty"));
    }
}

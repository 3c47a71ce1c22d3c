// ============================================
// File: crates/nodepulse-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Main Functionality
//! - `Timestamp`: Unix timestamp in seconds, attached to every status event
//!
//! ## ⚠️ Important Note for Next Developer
//! - Scheduling uses `tokio::time` (monotonic), never `Timestamp`
//! - `Timestamp` is purely for reporting
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds.
///
/// # Example
/// ```
/// use nodepulse_common::time::Timestamp;
///
/// let earlier = Timestamp::from_secs(1_700_000_000);
/// let now = Timestamp::now();
/// assert!(now > earlier);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a new timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a timestamp for the current time.
    ///
    /// A clock set before the Unix epoch reads as zero.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(i64::try_from(secs).unwrap_or(i64::MAX))
    }

    /// Returns the Unix timestamp in seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

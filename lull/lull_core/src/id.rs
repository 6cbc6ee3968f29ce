//! Identifiers used by the scheduler and its slice providers.
//!
//! # Examples
//!
//! ```
//! use lull_core::id::{BatchId, SliceHandle};
//! use std::str::FromStr;
//!
//! let batch = BatchId::new();
//! let parsed = BatchId::from_str(&batch.to_string()).unwrap();
//! assert_eq!(batch, parsed);
//!
//! let handle = SliceHandle::from_raw(7);
//! assert_eq!(handle.raw(), 7);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier for a submitted batch.
///
/// Every call to submit mints a fresh identifier, so two submissions of the
/// same tasks are still told apart in logs and statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an identifier from a known UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Opaque reference to a pending slice request.
///
/// Handles are minted by a slice provider and are only meaningful to the
/// provider that issued them. The scheduler stores at most one at a time
/// and hands it back to cancel the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceHandle(u64);

impl SliceHandle {
    /// Wrap a provider-specific request number.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The provider-specific request number.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SliceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slice-{}", self.0)
    }
}

//! Options attached to a slice request.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for a single slice request.
///
/// With a `timeout`, the provider must fire the request no later than the
/// timeout after arming, and report `did_timeout` on the deadline when it
/// fires late.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceOptions {
    /// Latest point, relative to arming, at which the slice must fire
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl SliceOptions {
    /// Options carrying the given timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

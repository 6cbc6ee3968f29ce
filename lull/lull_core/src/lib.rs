//! # Lull Core
//!
//! `lull_core` provides the building blocks shared by every lull crate:
//! error types, identifiers, the idle-slice traits and configuration.
//!
//! ## Scheduling Model
//!
//! Lull runs synchronous units of work inside bounded idle windows granted
//! by a host environment:
//!
//! 1. **Idle slices**: the host grants a window through a [`SliceProvider`]
//!    and describes its budget with a [`Deadline`].
//!
//! 2. **Batches**: work is submitted as an ordered batch of tasks. Results are
//!    delivered once, in submission order, when the whole batch has run.
//!
//! 3. **Supersession**: submitting a batch replaces the active one. The
//!    replaced batch is told through its cancellation hook.
//!
//! 4. **Single-threaded cooperation**: all state changes happen on the thread
//!    that pumps the provider. Nothing here needs a lock.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all lull components
//! - **id**: Batch identifiers and slice handles
//! - **traits**: The idle slice provider interface
//! - **types**: Options passed when arming a slice
//! - **utils**: Configuration and logging helpers

pub mod error;
pub mod id;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export key types and traits for convenience
pub use error::{Error, Result};
pub use id::{BatchId, SliceHandle};
pub use traits::{Deadline, SliceCallback, SliceProvider};
pub use types::SliceOptions;
pub use utils::{LogLevel, SchedulerConfig, TimerConfig};

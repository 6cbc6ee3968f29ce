//! Batch scheduling inside idle slices.
//!
//! This module provides the scheduler and its parts:
//!
//! - Task queue management for the active batch
//! - Slice execution against a deadline with a low-water mark
//! - Cancellation of superseded batches and outstanding slice requests
//! - A pure state machine describing every lifecycle transition

pub mod batch;
pub mod executor;
pub mod queue;
pub mod state;

// Re-export key types
pub use batch::{BatchScheduler, SchedulerStats};
pub use executor::has_budget;
pub use queue::{task, CancelCallback, FinishCallback, Submission, Task};
pub use state::{transition, Effect, Event, Phase, Snapshot, Transition};

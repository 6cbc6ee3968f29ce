#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Lull Scheduler
//!
//! Cooperative background batch scheduling for lull.
//!
//! This crate provides:
//!
//! - [`BatchScheduler`], which runs an ordered batch of synchronous tasks
//!   across one or more idle slices and reports all results at once
//! - A pure state machine describing the scheduler's lifecycle
//! - Slice providers: a timer-based emulation of an idle-callback host and a
//!   manually driven provider for deterministic tests
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use lull_core::TimerConfig;
//! use lull_scheduler::{task, BatchScheduler, Submission, TimerSliceProvider};
//!
//! let provider = Rc::new(TimerSliceProvider::new(TimerConfig::default()).unwrap());
//! let scheduler = BatchScheduler::new(provider.clone());
//!
//! scheduler
//!     .submit(Submission::new(vec![task(|| 2 + 2)], |results| {
//!         assert_eq!(results, vec![4]);
//!     }))
//!     .unwrap();
//!
//! provider.run_until_idle().unwrap();
//! assert!(scheduler.is_idle());
//! ```

/// Idle slice providers
pub mod provider;

/// Batch scheduler, slice executor and lifecycle state machine
pub mod scheduler;

// Re-export key types for easier access
pub use provider::{ManualDeadline, ManualSliceProvider, TimerSliceProvider};
pub use scheduler::{task, BatchScheduler, Phase, SchedulerStats, Submission, Task};

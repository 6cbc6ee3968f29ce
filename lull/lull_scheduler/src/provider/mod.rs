//! Idle slice providers.
//!
//! - [`TimerSliceProvider`] emulates an idle-callback host with a short timer
//!   and a wall-clock budget
//! - [`ManualSliceProvider`] fires only when told to, with caller-chosen
//!   deadlines

pub mod manual;
pub mod timer;

pub use manual::{ManualDeadline, ManualSliceProvider};
pub use timer::{TimerDeadline, TimerSliceProvider};

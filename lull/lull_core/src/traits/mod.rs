//! Core trait definitions.
//!
//! The scheduler never talks to a host environment directly. It asks a
//! [`SliceProvider`] for idle windows and inspects each window through a
//! [`Deadline`].

pub mod slice;

pub use slice::{Deadline, SliceCallback, SliceProvider};

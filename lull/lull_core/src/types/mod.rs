//! Data types shared between the scheduler and slice providers.

pub mod slice;

pub use slice::SliceOptions;

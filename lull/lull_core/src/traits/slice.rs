//! Idle slice provider trait definitions.
//!
//! A host environment exposes idle time through two operations: arm a
//! callback for the next idle period, and cancel a callback that has not
//! fired yet. Hosts without a native idle primitive emulate one with a short
//! timer and a wall-clock budget; callers must not be able to tell the
//! difference.

use std::time::Duration;

use crate::id::SliceHandle;
use crate::types::SliceOptions;

/// Budget descriptor for one idle slice.
///
/// A deadline is only meaningful while the slice callback it was passed to
/// is running.
pub trait Deadline {
    /// Whether the slice fired because its timeout elapsed rather than
    /// because the host went idle.
    fn did_timeout(&self) -> bool;

    /// How much of the slice budget is left.
    fn time_remaining(&self) -> Duration;
}

/// Callback armed by a slice request. Invoked at most once.
pub type SliceCallback = Box<dyn FnOnce(&dyn Deadline)>;

/// Source of idle execution windows.
///
/// Implementations are single-threaded: callbacks fire on the thread that
/// drives the provider, never from inside `request_slice` or `cancel_slice`.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::time::Duration;
/// use lull_core::id::SliceHandle;
/// use lull_core::traits::{Deadline, SliceCallback, SliceProvider};
/// use lull_core::types::SliceOptions;
///
/// struct Unbounded;
///
/// impl Deadline for Unbounded {
///     fn did_timeout(&self) -> bool {
///         false
///     }
///
///     fn time_remaining(&self) -> Duration {
///         Duration::MAX
///     }
/// }
///
/// #[derive(Default)]
/// struct Queue {
///     pending: RefCell<Vec<(SliceHandle, SliceCallback)>>,
///     next: RefCell<u64>,
/// }
///
/// impl SliceProvider for Queue {
///     fn request_slice(&self, callback: SliceCallback, _options: SliceOptions) -> SliceHandle {
///         let mut next = self.next.borrow_mut();
///         *next += 1;
///         let handle = SliceHandle::from_raw(*next);
///         self.pending.borrow_mut().push((handle, callback));
///         handle
///     }
///
///     fn cancel_slice(&self, handle: SliceHandle) {
///         self.pending.borrow_mut().retain(|(h, _)| *h != handle);
///     }
/// }
///
/// let queue = Queue::default();
/// let handle = queue.request_slice(Box::new(|d| assert!(!d.did_timeout())), SliceOptions::default());
/// queue.cancel_slice(handle);
/// assert!(queue.pending.borrow().is_empty());
/// ```
pub trait SliceProvider {
    /// Ask for `callback` to run during a future idle period, or at the
    /// latest once `options.timeout` has elapsed.
    fn request_slice(&self, callback: SliceCallback, options: SliceOptions) -> SliceHandle;

    /// Abort a request that has not fired yet.
    ///
    /// Cancelling a request that already fired, or was already cancelled,
    /// does nothing.
    fn cancel_slice(&self, handle: SliceHandle);
}

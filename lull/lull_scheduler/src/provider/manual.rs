//! Manually driven slice provider.
//!
//! Nothing fires until the caller says so, and the caller chooses the
//! deadline every slice sees. Scheduler tests use this to step through
//! slices one at a time.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use lull_core::id::SliceHandle;
use lull_core::traits::{Deadline, SliceCallback, SliceProvider};
use lull_core::types::SliceOptions;

/// A deadline with a caller-chosen budget.
pub struct ManualDeadline {
    did_timeout: bool,
    budget: Budget,
    reads: Cell<usize>,
}

enum Budget {
    Fixed(Duration),
    /// Each read consumes one value; reads past the end see zero.
    Scripted(RefCell<VecDeque<Duration>>),
}

impl ManualDeadline {
    /// A slice with far more budget than any test needs.
    pub fn ample() -> Self {
        Self::fixed(Duration::from_secs(3600))
    }

    /// A slice with no budget left.
    pub fn exhausted() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// A slice that fired because its timeout elapsed. Reports no budget.
    pub fn timed_out() -> Self {
        Self {
            did_timeout: true,
            ..Self::exhausted()
        }
    }

    /// A slice reporting the same remaining time on every read.
    pub fn fixed(remaining: Duration) -> Self {
        Self {
            did_timeout: false,
            budget: Budget::Fixed(remaining),
            reads: Cell::new(0),
        }
    }

    /// A slice reporting `values` on successive reads, then zero.
    ///
    /// ```
    /// use std::time::Duration;
    /// use lull_core::Deadline;
    /// use lull_scheduler::ManualDeadline;
    ///
    /// let deadline = ManualDeadline::scripted([Duration::from_millis(10)]);
    /// assert_eq!(deadline.time_remaining(), Duration::from_millis(10));
    /// assert_eq!(deadline.time_remaining(), Duration::ZERO);
    /// assert_eq!(deadline.reads(), 2);
    /// ```
    pub fn scripted(values: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            did_timeout: false,
            budget: Budget::Scripted(RefCell::new(values.into_iter().collect())),
            reads: Cell::new(0),
        }
    }

    /// How many times `time_remaining` was read.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl Deadline for ManualDeadline {
    fn did_timeout(&self) -> bool {
        self.did_timeout
    }

    fn time_remaining(&self) -> Duration {
        self.reads.set(self.reads.get() + 1);
        match &self.budget {
            Budget::Fixed(remaining) => *remaining,
            Budget::Scripted(values) => values.borrow_mut().pop_front().unwrap_or(Duration::ZERO),
        }
    }
}

struct PendingSlice {
    handle: SliceHandle,
    callback: SliceCallback,
}

/// Slice provider that fires requests only when told to.
///
/// Requests fire in the order they were made.
#[derive(Default)]
pub struct ManualSliceProvider {
    pending: RefCell<VecDeque<PendingSlice>>,
    next_id: Cell<u64>,
    requested: Cell<usize>,
    cancelled: Cell<usize>,
    fired: Cell<usize>,
    last_options: Cell<Option<SliceOptions>>,
}

impl ManualSliceProvider {
    /// Create a provider with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the oldest pending request with `deadline`.
    ///
    /// Returns `false` if nothing was pending.
    pub fn fire_next(&self, deadline: &dyn Deadline) -> bool {
        // Release the queue before the callback runs; it usually re-arms.
        let next = self.pending.borrow_mut().pop_front();
        match next {
            Some(slice) => {
                self.fired.set(self.fired.get() + 1);
                (slice.callback)(deadline);
                true
            }
            None => false,
        }
    }

    /// Keep firing with a fresh deadline from `make` until nothing is
    /// pending. Returns the number of slices fired.
    pub fn run_until_idle<D, F>(&self, mut make: F) -> usize
    where
        D: Deadline,
        F: FnMut() -> D,
    {
        let mut fired = 0;
        while !self.pending.borrow().is_empty() {
            let deadline = make();
            if self.fire_next(&deadline) {
                fired += 1;
            }
        }
        fired
    }

    /// Requests armed and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Total requests made.
    pub fn requested(&self) -> usize {
        self.requested.get()
    }

    /// Requests cancelled before they fired.
    pub fn cancelled(&self) -> usize {
        self.cancelled.get()
    }

    /// Requests fired.
    pub fn fired(&self) -> usize {
        self.fired.get()
    }

    /// Options passed with the most recent request.
    pub fn last_options(&self) -> Option<SliceOptions> {
        self.last_options.get()
    }
}

impl SliceProvider for ManualSliceProvider {
    fn request_slice(&self, callback: SliceCallback, options: SliceOptions) -> SliceHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.requested.set(self.requested.get() + 1);
        self.last_options.set(Some(options));

        let handle = SliceHandle::from_raw(id);
        self.pending
            .borrow_mut()
            .push_back(PendingSlice { handle, callback });
        handle
    }

    fn cancel_slice(&self, handle: SliceHandle) {
        let mut pending = self.pending.borrow_mut();
        if let Some(index) = pending.iter().position(|s| s.handle == handle) {
            pending.remove(index);
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }
}

//! Timer-based slice provider.
//!
//! Emulates an idle-callback host on a plain thread. Each request fires a
//! short, fixed delay after it was armed, and its deadline derives the
//! remaining budget from wall-clock time since arming, decaying to zero.
//! The thread that owns the provider drives it with [`TimerSliceProvider::turn`]
//! or [`TimerSliceProvider::run_until_idle`]; callbacks run on that thread.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use lull_core::error::{ProviderError, Result};
use lull_core::id::SliceHandle;
use lull_core::traits::{Deadline, SliceCallback, SliceProvider};
use lull_core::types::SliceOptions;
use lull_core::utils::TimerConfig;

/// Deadline handed to slices fired by [`TimerSliceProvider`].
#[derive(Debug, Clone, Copy)]
pub struct TimerDeadline {
    armed_at: Instant,
    budget: Duration,
    timeout: Option<Duration>,
}

impl TimerDeadline {
    /// A deadline for a slice armed at `armed_at`.
    pub fn new(armed_at: Instant, budget: Duration, timeout: Option<Duration>) -> Self {
        Self {
            armed_at,
            budget,
            timeout,
        }
    }
}

impl Deadline for TimerDeadline {
    fn did_timeout(&self) -> bool {
        self.timeout
            .is_some_and(|timeout| self.armed_at.elapsed() >= timeout)
    }

    fn time_remaining(&self) -> Duration {
        self.budget.saturating_sub(self.armed_at.elapsed())
    }
}

struct TimerSlice {
    callback: SliceCallback,
    armed_at: Instant,
    due_at: Instant,
    timeout: Option<Duration>,
}

/// Single-threaded timer emulation of an idle-callback host.
pub struct TimerSliceProvider {
    config: TimerConfig,
    pending: RefCell<BTreeMap<u64, TimerSlice>>,
    next_id: Cell<u64>,
    shut_down: Cell<bool>,
}

impl TimerSliceProvider {
    /// Create a provider.
    pub fn new(config: TimerConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            delay_ms = config.delay_ms,
            slice_budget_ms = config.slice_budget_ms,
            "Creating timer slice provider"
        );
        Ok(Self::build(config))
    }

    fn build(config: TimerConfig) -> Self {
        Self {
            config,
            pending: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(0),
            shut_down: Cell::new(false),
        }
    }

    /// The provider's configuration.
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Requests armed and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// When the earliest pending request becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.borrow().values().map(|s| s.due_at).min()
    }

    /// Fire every request that is due now, in due order.
    ///
    /// Requests armed by the callbacks of this turn wait for a later turn.
    /// Returns the number of slices fired.
    pub fn turn(&self) -> Result<usize> {
        if self.shut_down.get() {
            return Err(ProviderError::ShutDown.into());
        }

        let now = Instant::now();
        let mut due: Vec<(Instant, u64)> = self
            .pending
            .borrow()
            .iter()
            .filter(|(_, slice)| slice.due_at <= now)
            .map(|(id, slice)| (slice.due_at, *id))
            .collect();
        due.sort_unstable();

        let mut fired = 0;
        for (_, id) in due {
            // An earlier callback in this turn may have cancelled it.
            let Some(slice) = self.pending.borrow_mut().remove(&id) else {
                continue;
            };
            let deadline =
                TimerDeadline::new(slice.armed_at, self.config.slice_budget(), slice.timeout);
            trace!(id, remaining = ?deadline.time_remaining(), "Firing slice");
            (slice.callback)(&deadline);
            fired += 1;
        }

        Ok(fired)
    }

    /// Sleep until requests come due and fire them, until nothing is
    /// pending. Returns the number of slices fired.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut fired = 0;
        while let Some(due_at) = self.next_due() {
            let now = Instant::now();
            if due_at > now {
                thread::sleep(due_at - now);
            }
            fired += self.turn()?;
        }
        Ok(fired)
    }

    /// Drop every pending request. Later requests are dropped on arrival.
    pub fn shutdown(&self) {
        let dropped = {
            let mut pending = self.pending.borrow_mut();
            let dropped = pending.len();
            pending.clear();
            dropped
        };
        self.shut_down.set(true);
        debug!(dropped, "Timer slice provider shut down");
    }
}

impl Default for TimerSliceProvider {
    fn default() -> Self {
        Self::build(TimerConfig::default())
    }
}

impl SliceProvider for TimerSliceProvider {
    fn request_slice(&self, callback: SliceCallback, options: SliceOptions) -> SliceHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let handle = SliceHandle::from_raw(id);

        if self.shut_down.get() {
            warn!(%handle, "Slice requested after shutdown; it will never fire");
            return handle;
        }

        let armed_at = Instant::now();
        let delay = match options.timeout {
            Some(timeout) => self.config.delay().min(timeout),
            None => self.config.delay(),
        };

        self.pending.borrow_mut().insert(
            id,
            TimerSlice {
                callback,
                armed_at,
                due_at: armed_at + delay,
                timeout: options.timeout,
            },
        );
        handle
    }

    fn cancel_slice(&self, handle: SliceHandle) {
        if self.pending.borrow_mut().remove(&handle.raw()).is_some() {
            trace!(%handle, "Slice cancelled");
        }
    }
}

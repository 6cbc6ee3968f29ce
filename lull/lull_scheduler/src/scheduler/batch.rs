//! Background batch scheduler.
//!
//! [`BatchScheduler`] owns at most one active batch. Submitting a batch
//! supersedes the active one: its outstanding slice request is cancelled and
//! its cancellation hook fires before the new batch is installed. Tasks run
//! inside idle slices granted by a [`SliceProvider`]; when the queue drains,
//! the completion hook receives every result in submission order.
//!
//! The scheduler is single-threaded. The provider's slice callback is the
//! only way back in, and every hook is invoked after the scheduler's own
//! state has been updated, so hooks and tasks may call `submit` or `cancel`
//! on the same scheduler.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use lull_core::error::{Result, SchedulerError};
use lull_core::id::{BatchId, SliceHandle};
use lull_core::traits::{Deadline, SliceCallback, SliceProvider};
use lull_core::utils::SchedulerConfig;

use super::executor;
use super::queue::{ActiveBatch, Submission};
use super::state::{transition, Effect, Event, Phase, Snapshot};

/// Counters describing a scheduler's history.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Batches accepted by `submit`
    pub batches_submitted: u64,

    /// Batches that delivered their results
    pub batches_finished: u64,

    /// Batches superseded or cancelled before finishing
    pub batches_cancelled: u64,

    /// Batches dropped because a task panicked
    pub batches_aborted: u64,

    /// Slice requests made to the provider
    pub slices_requested: u64,

    /// Slice callbacks that ran for an active batch
    pub slices_run: u64,

    /// Tasks that ran to completion
    pub tasks_executed: u64,
}

/// Mutable scheduler state. Only touched through `Core::state`.
pub(super) struct State<T> {
    pub(super) phase: Phase,
    pub(super) batch: Option<ActiveBatch<T>>,
    /// Handle returned by the provider for the armed request
    outstanding: Option<SliceHandle>,
    /// Sequence number of the armed request; `None` when nothing is armed
    armed: Option<u64>,
    next_seq: u64,
    /// Bumped whenever the active batch is installed or removed
    pub(super) generation: u64,
}

impl<T> State<T> {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            batch: None,
            outstanding: None,
            armed: None,
            next_seq: 0,
            generation: 0,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            slice_outstanding: self.armed.is_some(),
            batch_active: self.batch.is_some(),
        }
    }

    fn take_batch(&mut self) -> Option<ActiveBatch<T>> {
        let batch = self.batch.take();
        if batch.is_some() {
            self.generation += 1;
        }
        batch
    }

    fn install(&mut self, batch: ActiveBatch<T>) {
        self.batch = Some(batch);
        self.generation += 1;
    }
}

/// Work produced by a transition that must run without the state borrowed.
pub(super) enum Deferred<T> {
    CancelSlice(SliceHandle),
    Cancelled(ActiveBatch<T>),
    Finished(ActiveBatch<T>),
    Arm,
}

/// Shared scheduler internals. Slice callbacks hold a weak reference.
pub(super) struct Core<T> {
    provider: Rc<dyn SliceProvider>,
    pub(super) config: SchedulerConfig,
    pub(super) state: RefCell<State<T>>,
    stats: RefCell<SchedulerStats>,
}

impl<T: 'static> Core<T> {
    pub(super) fn record(&self, update: impl FnOnce(&mut SchedulerStats)) {
        update(&mut self.stats.borrow_mut());
    }

    /// Apply `event` to the state and collect the work it implies.
    ///
    /// `incoming` is installed right before a slice is requested, after any
    /// previous batch has been taken out.
    pub(super) fn step(&self, event: Event, incoming: Option<ActiveBatch<T>>) -> Vec<Deferred<T>> {
        let mut state = self.state.borrow_mut();
        let snapshot = state.snapshot();
        let t = transition(snapshot, event);
        trace!(?event, from = ?snapshot.phase, to = ?t.next, effects = ?t.effects, "Scheduler transition");

        state.phase = t.next;
        let mut incoming = incoming;
        let mut deferred = Vec::with_capacity(t.effects.len());

        for effect in t.effects {
            match effect {
                Effect::CancelOutstanding => {
                    state.armed = None;
                    if let Some(handle) = state.outstanding.take() {
                        deferred.push(Deferred::CancelSlice(handle));
                    }
                }
                Effect::NotifyCancelled => {
                    if let Some(batch) = state.take_batch() {
                        deferred.push(Deferred::Cancelled(batch));
                    }
                }
                Effect::Discard => {
                    state.take_batch();
                }
                Effect::RequestSlice => {
                    if let Some(batch) = incoming.take() {
                        state.install(batch);
                    }
                    deferred.push(Deferred::Arm);
                }
                Effect::NotifyFinished => {
                    if let Some(batch) = state.take_batch() {
                        deferred.push(Deferred::Finished(batch));
                    }
                }
            }
        }

        deferred
    }

    /// Carry out deferred work in order.
    pub(super) fn run(self: &Rc<Self>, deferred: Vec<Deferred<T>>) {
        for work in deferred {
            match work {
                Deferred::CancelSlice(handle) => {
                    trace!(%handle, "Cancelling outstanding slice");
                    self.provider.cancel_slice(handle);
                }
                Deferred::Cancelled(batch) => {
                    info!(
                        batch = %batch.id(),
                        executed = batch.executed(),
                        remaining = batch.remaining(),
                        "Batch cancelled"
                    );
                    self.record(|s| s.batches_cancelled += 1);
                    batch.cancel();
                }
                Deferred::Finished(batch) => {
                    info!(batch = %batch.id(), results = batch.executed(), "Batch finished");
                    self.record(|s| s.batches_finished += 1);
                    batch.finish();
                }
                Deferred::Arm => self.arm(),
            }
        }
    }

    /// Request a slice for the active batch.
    fn arm(self: &Rc<Self>) {
        let (seq, options) = {
            let mut state = self.state.borrow_mut();
            let Some(options) = state.batch.as_ref().map(|b| b.options()) else {
                return;
            };
            state.next_seq += 1;
            let seq = state.next_seq;
            state.armed = Some(seq);
            (seq, options)
        };

        let weak = Rc::downgrade(self);
        let callback: SliceCallback = Box::new(move |deadline: &dyn Deadline| {
            if let Some(core) = weak.upgrade() {
                executor::run_slice(&core, seq, deadline);
            }
        });

        let handle = self.provider.request_slice(callback, options);
        self.record(|s| s.slices_requested += 1);

        let stale = {
            let mut state = self.state.borrow_mut();
            if state.armed == Some(seq) {
                state.outstanding = Some(handle);
                false
            } else {
                true
            }
        };

        if stale {
            // The request was superseded or already fired while arming.
            self.provider.cancel_slice(handle);
        } else {
            trace!(%handle, seq, "Slice requested");
        }
    }

    /// Claim the slice numbered `seq`. Returns the generation of the batch
    /// it belongs to, or `None` for a slice that is no longer wanted.
    pub(super) fn begin_slice(&self, seq: u64) -> Option<u64> {
        let mut state = self.state.borrow_mut();
        if state.armed != Some(seq) {
            trace!(seq, "Ignoring stale slice");
            return None;
        }
        state.armed = None;
        state.outstanding = None;
        Some(state.generation)
    }

    /// Take every active batch out, firing cancellation hooks.
    ///
    /// A hook may submit another batch; that batch is cancelled too, so the
    /// state is clear when this returns. Returns whether anything was
    /// cancelled.
    fn clear(self: &Rc<Self>) -> bool {
        let mut cancelled = false;
        loop {
            let deferred = self.step(Event::Cancelled, None);
            if deferred.is_empty() {
                return cancelled;
            }
            cancelled |= deferred
                .iter()
                .any(|d| matches!(d, Deferred::Cancelled(_)));
            self.run(deferred);
        }
    }
}

impl<T> Drop for Core<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().outstanding.take() {
            self.provider.cancel_slice(handle);
        }
    }
}

/// Cooperative scheduler running batches of tasks inside idle slices.
///
/// Cloning yields another handle to the same scheduler.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use lull_scheduler::provider::{ManualDeadline, ManualSliceProvider};
/// use lull_scheduler::scheduler::{task, BatchScheduler, Submission};
///
/// let provider = Rc::new(ManualSliceProvider::new());
/// let scheduler = BatchScheduler::new(provider.clone());
///
/// let results = Rc::new(RefCell::new(Vec::new()));
/// let sink = results.clone();
/// scheduler
///     .submit(Submission::new(vec![task(|| 1), task(|| 2)], move |r| {
///         *sink.borrow_mut() = r;
///     }))
///     .unwrap();
///
/// provider.fire_next(&ManualDeadline::ample());
/// assert_eq!(*results.borrow(), vec![1, 2]);
/// assert!(scheduler.is_idle());
/// ```
pub struct BatchScheduler<T: 'static> {
    core: Rc<Core<T>>,
}

impl<T: 'static> Clone for BatchScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: 'static> BatchScheduler<T> {
    /// Create a scheduler with the default configuration.
    pub fn new(provider: Rc<dyn SliceProvider>) -> Self {
        Self::build(provider, SchedulerConfig::default())
    }

    /// Create a scheduler with the given configuration.
    pub fn with_config(provider: Rc<dyn SliceProvider>, config: SchedulerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        Ok(Self::build(provider, config))
    }

    fn build(provider: Rc<dyn SliceProvider>, config: SchedulerConfig) -> Self {
        debug!(
            lower_limit_ms = config.time_remaining_lower_limit_ms,
            slice_timeout_ms = ?config.slice_timeout_ms,
            "Creating batch scheduler"
        );
        Self {
            core: Rc::new(Core {
                provider,
                config,
                state: RefCell::new(State::new()),
                stats: RefCell::new(SchedulerStats::default()),
            }),
        }
    }

    /// Replace the active batch with `submission`.
    ///
    /// Any outstanding slice is cancelled and the replaced batch's
    /// cancellation hook fires before the new batch is installed. The new
    /// batch then waits for its first slice, even when it has no tasks.
    ///
    /// An invalid submission is rejected without touching the active batch.
    pub fn submit(&self, submission: Submission<T>) -> Result<BatchId> {
        submission.validate()?;

        if self.core.clear() {
            debug!("Superseded the active batch");
        }

        let batch = ActiveBatch::new(submission, self.core.config.slice_options());
        let id = batch.id();
        debug!(batch = %id, tasks = batch.remaining(), "Batch submitted");
        self.core.record(|s| s.batches_submitted += 1);

        let deferred = self.core.step(Event::Submitted, Some(batch));
        self.core.run(deferred);

        Ok(id)
    }

    /// Cancel the active batch, if any.
    ///
    /// Returns whether a batch was cancelled. Cancelling an idle scheduler
    /// does nothing.
    pub fn cancel(&self) -> bool {
        let deferred = self.core.step(Event::Cancelled, None);
        let cancelled = deferred
            .iter()
            .any(|d| matches!(d, Deferred::Cancelled(_)));
        self.core.run(deferred);
        cancelled
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.core.state.borrow().phase
    }

    /// Whether there is no active batch.
    pub fn is_idle(&self) -> bool {
        self.core.state.borrow().batch.is_none()
    }

    /// Identifier of the active batch.
    pub fn active_batch(&self) -> Option<BatchId> {
        self.core.state.borrow().batch.as_ref().map(|b| b.id())
    }

    /// Tasks of the active batch that have not started.
    pub fn pending_tasks(&self) -> usize {
        self.core
            .state
            .borrow()
            .batch
            .as_ref()
            .map_or(0, |b| b.remaining())
    }

    /// Results accumulated so far by the active batch.
    pub fn completed_tasks(&self) -> usize {
        self.core
            .state
            .borrow()
            .batch
            .as_ref()
            .map_or(0, |b| b.executed())
    }

    /// Whether a slice request is armed and has not fired.
    pub fn has_outstanding_slice(&self) -> bool {
        self.core.state.borrow().armed.is_some()
    }

    /// Counters since the scheduler was created.
    pub fn stats(&self) -> SchedulerStats {
        *self.core.stats.borrow()
    }

    /// The scheduler's configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }
}

impl<T: 'static> fmt::Debug for BatchScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("phase", &self.phase())
            .field("active_batch", &self.active_batch())
            .field("pending_tasks", &self.pending_tasks())
            .field("outstanding", &self.has_outstanding_slice())
            .finish()
    }
}

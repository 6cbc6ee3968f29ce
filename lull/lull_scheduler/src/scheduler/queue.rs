//! Batch submissions and the active batch's task queue.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use lull_core::error::SchedulerError;
use lull_core::id::BatchId;
use lull_core::types::SliceOptions;

/// A zero-argument unit of work producing a `T`.
///
/// Tasks run to completion once started; the scheduler never interrupts one.
pub type Task<T> = Box<dyn FnOnce() -> T>;

/// Completion hook. Receives one result per task, in submission order.
pub type FinishCallback<T> = Box<dyn FnOnce(Vec<T>)>;

/// Cancellation hook.
pub type CancelCallback = Box<dyn FnOnce()>;

/// Box a closure as a [`Task`].
///
/// ```
/// use lull_scheduler::scheduler::{task, Task};
///
/// let tasks: Vec<Task<u32>> = vec![task(|| 1), task(move || 2)];
/// assert_eq!(tasks.len(), 2);
/// ```
pub fn task<T, F>(f: F) -> Task<T>
where
    F: FnOnce() -> T + 'static,
{
    Box::new(f)
}

/// An ordered set of tasks with its completion and cancellation hooks.
///
/// ```
/// use std::time::Duration;
/// use lull_scheduler::scheduler::{task, Submission};
///
/// let submission = Submission::new(vec![task(|| "a"), task(|| "b")], |results| {
///     assert_eq!(results, vec!["a", "b"]);
/// })
/// .on_cancel(|| println!("superseded"))
/// .slice_timeout(Duration::from_millis(100));
///
/// assert_eq!(submission.len(), 2);
/// ```
pub struct Submission<T> {
    tasks: Vec<Task<T>>,
    on_finish: FinishCallback<T>,
    on_cancel: Option<CancelCallback>,
    slice_timeout: Option<Duration>,
}

impl<T> Submission<T> {
    /// Create a submission. An empty task list is valid.
    pub fn new<F>(tasks: Vec<Task<T>>, on_finish: F) -> Self
    where
        F: FnOnce(Vec<T>) + 'static,
    {
        Self {
            tasks,
            on_finish: Box::new(on_finish),
            on_cancel: None,
            slice_timeout: None,
        }
    }

    /// Hook invoked if this batch is superseded or cancelled before it
    /// delivers its results.
    pub fn on_cancel<F>(mut self, on_cancel: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    /// Timeout passed with every slice request for this batch, overriding
    /// the scheduler's configured value.
    pub fn slice_timeout(mut self, timeout: Duration) -> Self {
        self.slice_timeout = Some(timeout);
        self
    }

    /// Number of tasks in the submission.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the submission has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), SchedulerError> {
        if self.slice_timeout == Some(Duration::ZERO) {
            return Err(SchedulerError::InvalidSubmission(
                "slice timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Submission<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("tasks", &self.tasks.len())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("slice_timeout", &self.slice_timeout)
            .finish()
    }
}

/// The batch that currently owns the scheduler's queue.
pub(crate) struct ActiveBatch<T> {
    id: BatchId,
    queue: VecDeque<Task<T>>,
    results: Vec<T>,
    on_finish: FinishCallback<T>,
    on_cancel: Option<CancelCallback>,
    options: SliceOptions,
}

impl<T> ActiveBatch<T> {
    /// Install a submission. Per-batch options win over `defaults`.
    pub(crate) fn new(submission: Submission<T>, defaults: SliceOptions) -> Self {
        let options = match submission.slice_timeout {
            Some(timeout) => SliceOptions::with_timeout(timeout),
            None => defaults,
        };
        let capacity = submission.tasks.len();

        Self {
            id: BatchId::new(),
            queue: submission.tasks.into(),
            results: Vec::with_capacity(capacity),
            on_finish: submission.on_finish,
            on_cancel: submission.on_cancel,
            options,
        }
    }

    pub(crate) fn id(&self) -> BatchId {
        self.id
    }

    pub(crate) fn options(&self) -> SliceOptions {
        self.options
    }

    pub(crate) fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn executed(&self) -> usize {
        self.results.len()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Task<T>> {
        self.queue.pop_front()
    }

    pub(crate) fn push_result(&mut self, value: T) {
        self.results.push(value);
    }

    /// Deliver the accumulated results.
    pub(crate) fn finish(self) {
        debug_assert!(self.queue.is_empty());
        (self.on_finish)(self.results);
    }

    /// Invoke the cancellation hook, if any. Pending tasks and partial
    /// results are dropped.
    pub(crate) fn cancel(self) {
        if let Some(on_cancel) = self.on_cancel {
            on_cancel();
        }
    }
}

//! Slice executor.
//!
//! Runs tasks from the front of the active batch's queue for as long as the
//! slice's [`Deadline`] allows, then either re-arms for the rest of the
//! batch or delivers the results.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, trace};

use lull_core::traits::Deadline;

use super::batch::Core;
use super::state::Event;

/// Whether another task may start within this slice.
///
/// The executor keeps going while the remaining budget is above the
/// low-water mark, or unconditionally once the slice has timed out.
pub fn has_budget(deadline: &dyn Deadline, lower_limit: Duration) -> bool {
    deadline.time_remaining() > lower_limit || deadline.did_timeout()
}

/// Body of every slice callback armed by the scheduler.
pub(super) fn run_slice<T: 'static>(core: &Rc<Core<T>>, seq: u64, deadline: &dyn Deadline) {
    let Some(generation) = core.begin_slice(seq) else {
        return;
    };
    core.record(|s| s.slices_run += 1);

    let deferred = core.step(Event::SliceFired, None);
    core.run(deferred);

    let lower_limit = core.config.time_remaining_lower_limit();
    let mut executed = 0usize;

    loop {
        let task = {
            let mut state = core.state.borrow_mut();
            if state.generation != generation {
                return;
            }
            let Some(batch) = state.batch.as_mut() else {
                return;
            };
            if batch.remaining() == 0 || !has_budget(deadline, lower_limit) {
                break;
            }
            batch.pop_front()
        };
        let Some(task) = task else {
            break;
        };

        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(value) => {
                core.record(|s| s.tasks_executed += 1);
                let mut state = core.state.borrow_mut();
                if state.generation != generation {
                    // The task itself superseded its batch.
                    debug!("Discarding result of a superseded batch");
                    return;
                }
                if let Some(batch) = state.batch.as_mut() {
                    batch.push_result(value);
                }
                executed += 1;
            }
            Err(payload) => {
                let current = core.state.borrow().generation == generation;
                if current {
                    error!(executed, "Task panicked; aborting batch");
                    core.record(|s| s.batches_aborted += 1);
                    let deferred = core.step(Event::Aborted, None);
                    core.run(deferred);
                }
                panic::resume_unwind(payload);
            }
        }
    }

    let remaining = {
        let state = core.state.borrow();
        state.batch.as_ref().map_or(0, |b| b.remaining())
    };

    if remaining > 0 {
        debug!(executed, remaining, "Slice budget exhausted; re-arming");
    } else {
        trace!(executed, "Queue drained");
    }

    let deferred = core.step(Event::Drained { remaining }, None);
    core.run(deferred);
}

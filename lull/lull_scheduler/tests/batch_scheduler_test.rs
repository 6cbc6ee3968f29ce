//! Integration tests for the batch scheduler.
//!
//! These drive the scheduler through a manually fired slice provider so every
//! slice, deadline and supersession happens at a known point.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use lull_core::error::{Error, SchedulerError};
use lull_core::utils::SchedulerConfig;
use lull_scheduler::scheduler::{task, BatchScheduler, Phase, Submission, Task};
use lull_scheduler::{ManualDeadline, ManualSliceProvider};

/// Records every hook invocation for one batch.
struct Recorder<T> {
    finished: RefCell<Vec<Vec<T>>>,
    cancelled: Cell<usize>,
}

impl<T: 'static> Recorder<T> {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            finished: RefCell::new(Vec::new()),
            cancelled: Cell::new(0),
        })
    }

    fn submission(self: &Rc<Self>, tasks: Vec<Task<T>>) -> Submission<T> {
        let on_finish = self.clone();
        let on_cancel = self.clone();
        Submission::new(tasks, move |results| {
            on_finish.finished.borrow_mut().push(results)
        })
        .on_cancel(move || on_cancel.cancelled.set(on_cancel.cancelled.get() + 1))
    }

    fn finish_count(&self) -> usize {
        self.finished.borrow().len()
    }
}

fn setup<T: 'static>() -> (Rc<ManualSliceProvider>, BatchScheduler<T>) {
    let provider = Rc::new(ManualSliceProvider::new());
    let scheduler = BatchScheduler::new(provider.clone());
    (provider, scheduler)
}

/// Tasks that count how many of them actually ran.
fn counted_tasks(count: usize, ran: &Rc<Cell<usize>>) -> Vec<Task<usize>> {
    (0..count)
        .map(|n| {
            let ran = ran.clone();
            task(move || {
                ran.set(ran.get() + 1);
                n
            })
        })
        .collect()
}

#[test]
fn test_ample_budget_finishes_in_one_slice() {
    let (provider, scheduler) = setup();
    let recorder = Recorder::new();

    scheduler
        .submit(recorder.submission(vec![task(|| 1), task(|| 2), task(|| 3)]))
        .unwrap();
    assert_eq!(scheduler.phase(), Phase::Scheduled);
    assert!(scheduler.has_outstanding_slice());

    assert!(provider.fire_next(&ManualDeadline::ample()));

    assert_eq!(*recorder.finished.borrow(), vec![vec![1, 2, 3]]);
    assert_eq!(recorder.cancelled.get(), 0);
    assert_eq!(provider.requested(), 1);
    assert_eq!(provider.pending(), 0);
    assert!(scheduler.is_idle());
    assert_eq!(scheduler.phase(), Phase::Idle);
}

#[test]
fn test_supersede_before_first_slice() {
    let (provider, scheduler) = setup();
    let first = Recorder::new();
    let second = Recorder::new();
    let first_ran = Rc::new(Cell::new(0));

    let tasks: Vec<Task<String>> = (0..5)
        .map(|n| {
            let ran = first_ran.clone();
            task(move || {
                ran.set(ran.get() + 1);
                n.to_string()
            })
        })
        .collect();
    scheduler.submit(first.submission(tasks)).unwrap();

    scheduler
        .submit(second.submission(vec![task(|| "x".to_string()), task(|| "y".to_string())]))
        .unwrap();

    // The first batch's request was withdrawn before the second was armed.
    assert_eq!(first.cancelled.get(), 1);
    assert_eq!(provider.cancelled(), 1);
    assert_eq!(provider.pending(), 1);

    provider.run_until_idle(ManualDeadline::ample);

    assert_eq!(first.finish_count(), 0);
    assert_eq!(first.cancelled.get(), 1);
    assert_eq!(first_ran.get(), 0);
    assert_eq!(
        *second.finished.borrow(),
        vec![vec!["x".to_string(), "y".to_string()]]
    );
    assert_eq!(second.cancelled.get(), 0);
}

#[test]
fn test_one_task_per_slice() {
    let provider = Rc::new(ManualSliceProvider::new());
    let config = SchedulerConfig {
        time_remaining_lower_limit_ms: 1,
        slice_timeout_ms: None,
    };
    let scheduler = BatchScheduler::with_config(provider.clone(), config).unwrap();
    let recorder = Recorder::new();

    scheduler
        .submit(recorder.submission(vec![task(|| 'a'), task(|| 'b'), task(|| 'c')]))
        .unwrap();

    let mut pending_after_each_slice = Vec::new();
    while provider.pending() > 0 {
        // Just above the low-water mark for one read, then exhausted.
        let deadline = ManualDeadline::scripted([Duration::from_millis(2)]);
        provider.fire_next(&deadline);
        pending_after_each_slice.push(scheduler.pending_tasks());
    }

    assert_eq!(provider.requested(), 3);
    assert_eq!(pending_after_each_slice, vec![2, 1, 0]);
    assert_eq!(*recorder.finished.borrow(), vec![vec!['a', 'b', 'c']]);
    assert_eq!(recorder.cancelled.get(), 0);
}

#[test]
fn test_empty_batch_finishes_after_one_slice() {
    let (provider, scheduler) = setup::<u8>();
    let recorder = Recorder::new();

    scheduler.submit(recorder.submission(Vec::new())).unwrap();
    provider.run_until_idle(ManualDeadline::exhausted);

    assert_eq!(*recorder.finished.borrow(), vec![Vec::<u8>::new()]);
    assert_eq!(provider.requested(), 1);
    assert!(scheduler.is_idle());
}

#[test]
fn test_cancel_when_idle_is_noop() {
    let (provider, scheduler) = setup::<u8>();

    assert!(!scheduler.cancel());
    assert!(scheduler.is_idle());
    assert_eq!(provider.requested(), 0);
    assert_eq!(provider.cancelled(), 0);
    assert_eq!(scheduler.stats().batches_cancelled, 0);
}

#[test]
fn test_cancel_active_batch() {
    let (provider, scheduler) = setup();
    let recorder = Recorder::new();
    let ran = Rc::new(Cell::new(0));

    scheduler
        .submit(recorder.submission(counted_tasks(4, &ran)))
        .unwrap();
    assert!(scheduler.cancel());
    assert!(!scheduler.cancel());

    assert_eq!(recorder.cancelled.get(), 1);
    assert_eq!(provider.pending(), 0);
    assert_eq!(provider.cancelled(), 1);
    assert_eq!(provider.run_until_idle(ManualDeadline::ample), 0);
    assert_eq!(ran.get(), 0);
    assert_eq!(recorder.finish_count(), 0);
}

#[test]
fn test_exhausted_slice_rearms_without_cancelling() {
    let (provider, scheduler) = setup();
    let recorder = Recorder::new();
    let ran = Rc::new(Cell::new(0));

    scheduler
        .submit(recorder.submission(counted_tasks(2, &ran)))
        .unwrap();

    provider.fire_next(&ManualDeadline::exhausted());
    assert_eq!(ran.get(), 0);
    assert_eq!(provider.requested(), 2);
    assert_eq!(scheduler.phase(), Phase::Scheduled);
    assert_eq!(recorder.cancelled.get(), 0);

    provider.fire_next(&ManualDeadline::ample());
    assert_eq!(*recorder.finished.borrow(), vec![vec![0, 1]]);
}

#[test]
fn test_timed_out_slice_drains_despite_no_budget() {
    let (provider, scheduler) = setup();
    let recorder = Recorder::new();
    let ran = Rc::new(Cell::new(0));

    scheduler
        .submit(recorder.submission(counted_tasks(6, &ran)))
        .unwrap();
    provider.fire_next(&ManualDeadline::timed_out());

    assert_eq!(ran.get(), 6);
    assert_eq!(provider.requested(), 1);
    assert_eq!(recorder.finish_count(), 1);
}

#[test]
fn test_low_water_mark_is_exclusive() {
    let provider = Rc::new(ManualSliceProvider::new());
    let config = SchedulerConfig {
        time_remaining_lower_limit_ms: 5,
        slice_timeout_ms: None,
    };
    let scheduler = BatchScheduler::with_config(provider.clone(), config).unwrap();
    let ran = Rc::new(Cell::new(0));

    scheduler
        .submit(Submission::new(counted_tasks(1, &ran), |_| {}))
        .unwrap();
    provider.fire_next(&ManualDeadline::fixed(Duration::from_millis(5)));
    assert_eq!(ran.get(), 0);

    provider.fire_next(&ManualDeadline::fixed(Duration::from_millis(6)));
    assert_eq!(ran.get(), 1);
    assert!(scheduler.is_idle());
}

#[test]
fn test_results_length_tracks_executed_tasks() {
    let (provider, scheduler) = setup();
    let ran = Rc::new(Cell::new(0));

    scheduler
        .submit(Submission::new(counted_tasks(5, &ran), |_| {}))
        .unwrap();

    let deadline = ManualDeadline::scripted([Duration::from_secs(1); 2]);
    provider.fire_next(&deadline);

    assert_eq!(scheduler.completed_tasks(), 2);
    assert_eq!(scheduler.pending_tasks(), 3);
    assert_eq!(ran.get(), 2);
}

#[test]
fn test_submit_from_finish_hook() {
    let (provider, scheduler) = setup();
    let second = Recorder::new();

    let chained = scheduler.clone();
    let follow_up = second.clone();
    scheduler
        .submit(Submission::new(vec![task(|| 1)], move |first| {
            assert_eq!(first, vec![1]);
            chained
                .submit(follow_up.submission(vec![task(|| 2)]))
                .unwrap();
        }))
        .unwrap();

    assert_eq!(provider.run_until_idle(ManualDeadline::ample), 2);
    assert_eq!(*second.finished.borrow(), vec![vec![2]]);
    assert_eq!(second.cancelled.get(), 0);
    assert_eq!(scheduler.stats().batches_finished, 2);
}

#[test]
fn test_submit_from_inside_a_task() {
    let (provider, scheduler) = setup();
    let outer = Recorder::new();
    let inner = Recorder::new();
    let later_ran = Rc::new(Cell::new(false));

    let reentrant = scheduler.clone();
    let inner_hooks = inner.clone();
    let later = later_ran.clone();
    scheduler
        .submit(outer.submission(vec![
            task(|| 10),
            task(move || {
                reentrant
                    .submit(inner_hooks.submission(vec![task(|| 20)]))
                    .unwrap();
                11
            }),
            task(move || {
                later.set(true);
                12
            }),
        ]))
        .unwrap();

    provider.run_until_idle(ManualDeadline::ample);

    assert_eq!(outer.cancelled.get(), 1);
    assert_eq!(outer.finish_count(), 0);
    assert!(!later_ran.get());
    assert_eq!(*inner.finished.borrow(), vec![vec![20]]);
}

#[test]
fn test_cancel_hook_that_submits_is_superseded() {
    let (provider, scheduler) = setup();
    let first = Recorder::new();
    let from_hook = Recorder::new();
    let last = Recorder::new();

    let reentrant = scheduler.clone();
    let hook_batch = from_hook.clone();
    scheduler
        .submit(Submission::new(vec![task(|| 1)], |_| {}).on_cancel(move || {
            reentrant
                .submit(hook_batch.submission(vec![task(|| 2)]))
                .unwrap();
        }))
        .unwrap();
    scheduler.submit(first.submission(vec![task(|| 3)])).unwrap();
    scheduler.submit(last.submission(vec![task(|| 4)])).unwrap();

    provider.run_until_idle(ManualDeadline::ample);

    assert_eq!(from_hook.cancelled.get(), 1);
    assert_eq!(from_hook.finish_count(), 0);
    assert_eq!(first.cancelled.get(), 1);
    assert_eq!(*last.finished.borrow(), vec![vec![4]]);
    assert_eq!(provider.pending(), 0);
}

#[test]
fn test_panicking_task_aborts_batch() {
    let (provider, scheduler) = setup();
    let recorder = Recorder::new();

    scheduler
        .submit(recorder.submission(vec![
            task(|| 1),
            task(|| panic!("task failed")),
            task(|| 3),
        ]))
        .unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        provider.fire_next(&ManualDeadline::ample());
    }));
    assert!(outcome.is_err());

    assert!(scheduler.is_idle());
    assert_eq!(scheduler.phase(), Phase::Idle);
    assert!(!scheduler.has_outstanding_slice());
    assert_eq!(recorder.finish_count(), 0);
    assert_eq!(recorder.cancelled.get(), 0);
    assert_eq!(scheduler.stats().batches_aborted, 1);
    assert_eq!(provider.pending(), 0);

    // The scheduler remains usable.
    let next = Recorder::new();
    scheduler.submit(next.submission(vec![task(|| 7)])).unwrap();
    provider.run_until_idle(ManualDeadline::ample);
    assert_eq!(*next.finished.borrow(), vec![vec![7]]);
}

#[test]
fn test_fallible_tasks_deliver_errors_as_results() {
    let (provider, scheduler) = setup();
    let recorder = Recorder::new();

    scheduler
        .submit(recorder.submission(vec![
            task(|| Ok(1)),
            task(|| Err("bad line".to_string())),
            task(|| Ok(3)),
        ]))
        .unwrap();
    provider.run_until_idle(ManualDeadline::ample);

    assert_eq!(
        *recorder.finished.borrow(),
        vec![vec![Ok(1), Err("bad line".to_string()), Ok(3)]]
    );
}

#[test]
fn test_invalid_submission_leaves_active_batch_alone() {
    let (provider, scheduler) = setup();
    let recorder = Recorder::new();

    let active = scheduler
        .submit(recorder.submission(vec![task(|| 1)]))
        .unwrap();

    let err = scheduler
        .submit(Submission::new(vec![task(|| 2)], |_| {}).slice_timeout(Duration::ZERO))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Scheduler(SchedulerError::InvalidSubmission(_))
    ));

    assert_eq!(scheduler.active_batch(), Some(active));
    assert_eq!(recorder.cancelled.get(), 0);
    assert_eq!(provider.requested(), 1);

    provider.run_until_idle(ManualDeadline::ample);
    assert_eq!(*recorder.finished.borrow(), vec![vec![1]]);
}

#[test]
fn test_invalid_config_is_rejected() {
    let provider = Rc::new(ManualSliceProvider::new());
    let config = SchedulerConfig {
        time_remaining_lower_limit_ms: 1,
        slice_timeout_ms: Some(0),
    };
    let err = BatchScheduler::<()>::with_config(provider, config).unwrap_err();
    assert!(matches!(
        err,
        Error::Scheduler(SchedulerError::InvalidConfig(_))
    ));
}

#[test]
fn test_slice_timeout_reaches_provider() {
    let provider = Rc::new(ManualSliceProvider::new());
    let config = SchedulerConfig {
        time_remaining_lower_limit_ms: 1,
        slice_timeout_ms: Some(250),
    };
    let scheduler = BatchScheduler::with_config(provider.clone(), config).unwrap();

    scheduler
        .submit(Submission::new(vec![task(|| ())], |_| {}))
        .unwrap();
    assert_eq!(
        provider.last_options().unwrap().timeout,
        Some(Duration::from_millis(250))
    );

    scheduler
        .submit(Submission::new(vec![task(|| ())], |_| {}).slice_timeout(Duration::from_millis(40)))
        .unwrap();
    assert_eq!(
        provider.last_options().unwrap().timeout,
        Some(Duration::from_millis(40))
    );
}

#[test]
fn test_dropping_scheduler_withdraws_request() {
    let provider = Rc::new(ManualSliceProvider::new());
    {
        let scheduler = BatchScheduler::new(provider.clone());
        scheduler
            .submit(Submission::new(vec![task(|| 1)], |_| {
                panic!("dropped scheduler must not finish")
            }))
            .unwrap();
        assert_eq!(provider.pending(), 1);
    }
    assert_eq!(provider.pending(), 0);
    assert_eq!(provider.cancelled(), 1);
}

#[test]
fn test_schedulers_sharing_a_provider_are_independent() {
    let provider = Rc::new(ManualSliceProvider::new());
    let left = BatchScheduler::new(provider.clone());
    let right = BatchScheduler::new(provider.clone());
    let left_hooks = Recorder::new();
    let right_hooks = Recorder::new();

    left.submit(left_hooks.submission(vec![task(|| "l")])).unwrap();
    right.submit(right_hooks.submission(vec![task(|| "r")])).unwrap();

    provider.run_until_idle(ManualDeadline::ample);

    assert_eq!(*left_hooks.finished.borrow(), vec![vec!["l"]]);
    assert_eq!(*right_hooks.finished.borrow(), vec![vec!["r"]]);
    assert_eq!(left_hooks.cancelled.get() + right_hooks.cancelled.get(), 0);
}

#[test]
fn test_stats() {
    let (provider, scheduler) = setup();
    let ran = Rc::new(Cell::new(0));

    scheduler
        .submit(Submission::new(counted_tasks(3, &ran), |_| {}))
        .unwrap();
    scheduler
        .submit(Submission::new(counted_tasks(2, &ran), |_| {}))
        .unwrap();
    provider.fire_next(&ManualDeadline::exhausted());
    provider.run_until_idle(ManualDeadline::ample);

    let stats = scheduler.stats();
    assert_eq!(stats.batches_submitted, 2);
    assert_eq!(stats.batches_cancelled, 1);
    assert_eq!(stats.batches_finished, 1);
    assert_eq!(stats.slices_requested, 3);
    assert_eq!(stats.slices_run, 2);
    assert_eq!(stats.tasks_executed, 2);

    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["tasks_executed"], 2);
}

//! Scheduler state machine.
//!
//! Every change to a scheduler's lifecycle goes through [`transition`], a
//! pure function of the current [`Snapshot`] and an [`Event`]. It returns
//! the next [`Phase`] and the ordered [`Effect`]s the scheduler must carry
//! out. Nothing here touches tasks, callbacks or providers, so the rules can
//! be tested without any timers.
//!
//! ```text
//!            submit                 slice fires
//!   Idle ───────────────► Scheduled ───────────► Draining
//!    ▲                        ▲                     │
//!    │                        └──── tasks remain ───┤
//!    └──────────────── queue empty (finished) ──────┘
//! ```
//!
//! Cancellation and task aborts return to `Idle` from any phase.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No active batch and no outstanding slice request
    #[default]
    Idle,

    /// A batch is active and waiting for its next slice
    Scheduled,

    /// A slice is running tasks from the active batch
    Draining,
}

/// What the state machine needs to know about the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase
    pub phase: Phase,

    /// Whether a slice request is armed and has not fired
    pub slice_outstanding: bool,

    /// Whether a batch is installed and has not delivered its results
    pub batch_active: bool,
}

impl Snapshot {
    /// Snapshot of a scheduler with nothing to do.
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            slice_outstanding: false,
            batch_active: false,
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A new batch is being installed
    Submitted,

    /// The armed slice request fired
    SliceFired,

    /// The executor stopped running tasks for this slice
    Drained {
        /// Tasks still queued for the active batch
        remaining: usize,
    },

    /// The active batch is being superseded or cancelled
    Cancelled,

    /// A task panicked and the active batch is being dropped
    Aborted,
}

/// Side effects requested by a transition, in the order they must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Cancel the outstanding slice request
    CancelOutstanding,

    /// Remove the active batch and invoke its cancellation hook
    NotifyCancelled,

    /// Remove the active batch without invoking any hook
    Discard,

    /// Arm a slice request for the active batch
    RequestSlice,

    /// Remove the active batch and deliver its results
    NotifyFinished,
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Phase after the event
    pub next: Phase,

    /// Effects to run, in order
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: Phase) -> Self {
        Self {
            next,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn with_if(self, condition: bool, effect: Effect) -> Self {
        if condition {
            self.with(effect)
        } else {
            self
        }
    }
}

/// Compute the next phase and effects for `event`.
///
/// Events that make no sense in the current phase (a slice firing while
/// idle, a drain report outside a slice) leave the phase unchanged and
/// request nothing.
pub fn transition(snapshot: Snapshot, event: Event) -> Transition {
    match event {
        Event::Submitted => Transition::to(Phase::Scheduled)
            .with_if(snapshot.slice_outstanding, Effect::CancelOutstanding)
            .with_if(snapshot.batch_active, Effect::NotifyCancelled)
            .with(Effect::RequestSlice),

        Event::Cancelled => Transition::to(Phase::Idle)
            .with_if(snapshot.slice_outstanding, Effect::CancelOutstanding)
            .with_if(snapshot.batch_active, Effect::NotifyCancelled),

        Event::Aborted => Transition::to(Phase::Idle)
            .with_if(snapshot.slice_outstanding, Effect::CancelOutstanding)
            .with_if(snapshot.batch_active, Effect::Discard),

        Event::SliceFired => match snapshot.phase {
            Phase::Scheduled if snapshot.batch_active => Transition::to(Phase::Draining),
            phase => Transition::to(phase),
        },

        Event::Drained { remaining } => match snapshot.phase {
            Phase::Draining if remaining > 0 => {
                Transition::to(Phase::Scheduled).with(Effect::RequestSlice)
            }
            Phase::Draining => Transition::to(Phase::Idle).with(Effect::NotifyFinished),
            phase => Transition::to(phase),
        },
    }
}

//! Structured error types for the simulation kernel.
//!
//! All fallible public APIs return `SimResult<T>`. Invariant violations
//! (queue or clock-model corruption) are separated from reported
//! conditions such as an unrecognized event, so callers can decide
//! whether a run may be resumed.

use thiserror::Error;

use crate::clock::ClockId;
use crate::event::EventId;
use crate::state::StateId;
use crate::time::VirtualTime;

/// The top-level error type for the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    // ── Registry errors ───────────────────────────────────

    /// A state id was referenced but is not registered.
    #[error("state {0} not found")]
    StateNotFound(StateId),

    /// Attempted to attach a state that already has a parent.
    #[error("state {state} already belongs to {parent}")]
    AlreadyParented { state: StateId, parent: StateId },

    /// A machine definition or structural edit is malformed.
    #[error("invalid machine: {0}")]
    InvalidMachine(String),

    // ── Dispatch errors ───────────────────────────────────

    /// No transition matches the active child and event kind.
    #[error("state {state} has no transition for {kind} while in {child}")]
    UnrecognizedEvent {
        state: StateId,
        child: &'static str,
        kind: String,
    },

    /// An event was delivered to a parallel state that is not active.
    #[error("parallel state {0} received an event while inactive")]
    InactiveParallel(StateId),

    // ── Timer errors ──────────────────────────────────────

    /// Timers bubble to the parent; a top-level state has none.
    #[error("state {0} has no parent to receive its timer")]
    NoParent(StateId),

    /// A timer resolved to a reference time earlier than now.
    #[error("cannot schedule event at {requested} when current time is {current}")]
    NonCausalEvent {
        requested: VirtualTime,
        current: VirtualTime,
    },

    /// Time arithmetic left the representable range.
    #[error("time overflow while scheduling on clock {0}")]
    TimeOverflow(ClockId),

    // ── Clock errors ──────────────────────────────────────

    /// The reference clock is only advanced by the engine.
    #[error("the reference clock cannot be set")]
    ReferenceClockImmutable,

    /// Drift must keep the clock running forward (greater than -10^9 PPB).
    #[error("clock drift {0} ppb is out of range")]
    InvalidDrift(i64),

    /// A clock id was referenced but does not exist.
    #[error("clock {0} not found")]
    ClockNotFound(ClockId),

    // ── Invariant violations ──────────────────────────────

    /// The queue produced an event earlier than the current time.
    #[error("time went backward: event {event} at {at}, engine at {current}")]
    TimeWentBackward {
        event: EventId,
        at: VirtualTime,
        current: VirtualTime,
    },
}

impl SimError {
    /// Whether the error signals corruption of the queue or clock model.
    ///
    /// A run that failed with a fatal error must not be resumed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::TimeWentBackward { .. } | SimError::NonCausalEvent { .. }
        )
    }
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

//! `Behavior` trait and the `StateContext` handed to it.

use std::fmt;

use crate::clock::ClockId;
use crate::engine::Kernel;
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventId, EventKind};
use crate::time::VirtualTime;

use super::id::StateId;

// ── Behavior ──────────────────────────────────────────────────────────

/// Per-instance hooks of a state.
///
/// Every hook has a default, so a behavior only overrides what it needs.
/// Hooks run synchronously inside the dispatch of one event and reach
/// the simulation through `ctx`.
///
/// ```rust
/// use skew::{Behavior, SimResult, StateContext, SEC};
///
/// struct Blink;
///
/// impl Behavior<&'static str> for Blink {
///     fn entry(&mut self, ctx: &mut StateContext<'_, &'static str>) -> SimResult<()> {
///         ctx.set_timer(SEC, "Next")?;
///         ctx.log("on")
///     }
/// }
/// ```
pub trait Behavior<K: EventKind> {
    /// Runs once after the state is registered.
    fn created(&mut self, _ctx: &mut StateContext<'_, K>) -> SimResult<()> {
        Ok(())
    }

    /// Runs when the state becomes active.
    fn entry(&mut self, _ctx: &mut StateContext<'_, K>) -> SimResult<()> {
        Ok(())
    }

    /// Runs when the state stops being active.
    fn exit(&mut self, _ctx: &mut StateContext<'_, K>) -> SimResult<()> {
        Ok(())
    }

    /// Events delivered to an atomic state. Ignored by default.
    fn on_event(&mut self, _ctx: &mut StateContext<'_, K>, _event: &Event<K>) -> SimResult<()> {
        Ok(())
    }

    /// A composite received an event its table has no row for while
    /// `child` was active.
    fn unrecognized(
        &mut self,
        ctx: &mut StateContext<'_, K>,
        child: &'static str,
        event: &Event<K>,
    ) -> SimResult<()> {
        Err(SimError::UnrecognizedEvent {
            state: ctx.id(),
            child,
            kind: format!("{:?}", event.kind),
        })
    }
}

/// The behavior of states that declare none.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passive;

impl<K: EventKind> Behavior<K> for Passive {}

// ── LogRecord ─────────────────────────────────────────────────────────

/// One line emitted through [`StateContext::log`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub state: StateId,
    pub parent: Option<StateId>,
    pub name: &'static str,
    /// Time on the state's own clock.
    pub local_time: VirtualTime,
    pub reference_time: VirtualTime,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self
            .parent
            .map(|p| p.raw().to_string())
            .unwrap_or_else(|| "-".into());
        write!(
            f,
            "{:>4} {:14.9} {}",
            parent,
            self.local_time.as_secs_f64(),
            self.message
        )
    }
}

/// Callback receiving every [`LogRecord`].
pub type LogHook = Box<dyn FnMut(&LogRecord)>;

// ── StateContext ──────────────────────────────────────────────────────

/// What a state's hooks and its composite's actions can touch: its own
/// identity and clock, timers, cancellation and logging.
pub struct StateContext<'a, K: EventKind> {
    kernel: &'a mut Kernel<K>,
    state: StateId,
    parent: Option<StateId>,
    name: &'static str,
    clock: ClockId,
}

impl<'a, K: EventKind> StateContext<'a, K> {
    pub(crate) fn new(
        kernel: &'a mut Kernel<K>,
        state: StateId,
        parent: Option<StateId>,
        name: &'static str,
        clock: ClockId,
    ) -> Self {
        StateContext {
            kernel,
            state,
            parent,
            name,
            clock,
        }
    }

    #[inline]
    pub fn id(&self) -> StateId {
        self.state
    }

    #[inline]
    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn clock(&self) -> ClockId {
        self.clock
    }

    /// Local time on this state's clock.
    pub fn time(&self) -> SimResult<VirtualTime> {
        self.kernel.local_time(self.clock)
    }

    /// Current reference time.
    pub fn reference_time(&self) -> VirtualTime {
        self.kernel.clocks.now()
    }

    /// Send `kind` to this state's parent after `delay`, measured on this
    /// state's clock.
    pub fn set_timer(&mut self, delay: u64, kind: K) -> SimResult<EventId> {
        self.kernel
            .schedule_timer(self.state, self.parent, self.clock, delay, kind)
    }

    /// Cancel a pending event. Returns `false` if it was unknown or
    /// already canceled.
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.kernel.scheduler.cancel(event)
    }

    /// Emit a log line tagged with this state and its local time.
    pub fn log(&mut self, message: impl fmt::Display) -> SimResult<()> {
        let record = LogRecord {
            state: self.state,
            parent: self.parent,
            name: self.name,
            local_time: self.time()?,
            reference_time: self.reference_time(),
            message: message.to_string(),
        };
        self.kernel.emit(&record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_record_layout() {
        let record = LogRecord {
            state: StateId::new(4),
            parent: Some(StateId::new(2)),
            name: "Red",
            local_time: VirtualTime::new(1_500_000_000),
            reference_time: VirtualTime::new(1_500_000_000),
            message: "ON".into(),
        };
        assert_eq!(record.to_string(), "   2    1.500000000 ON");
    }

    #[test]
    fn test_top_level_record_has_no_parent() {
        let record = LogRecord {
            state: StateId::new(0),
            parent: None,
            name: "Top",
            local_time: VirtualTime::ZERO,
            reference_time: VirtualTime::ZERO,
            message: "start".into(),
        };
        assert!(record.to_string().starts_with("   -"));
    }
}

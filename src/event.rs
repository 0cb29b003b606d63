/// Event records for the simulation kernel.
///
/// An `Event` is created by a timer (or by `Engine::send`), sits in the
/// scheduler's priority queue, and is dispatched to its target state when
/// popped. Once scheduled it is immutable; cancellation is tracked by the
/// scheduler and only reflected on the record at pop time.

use std::fmt::Debug;
use std::hash::Hash;

use crate::clock::ClockId;
use crate::state::StateId;
use crate::time::VirtualTime;

// ── Event kind ────────────────────────────────────────────────────────

/// Application-defined event tag.
///
/// Any small value type comparable by equality works; a fieldless enum is
/// the usual choice:
///
/// ```rust
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// enum Signal { TimeOut, Exit }
///
/// fn takes_kind<K: skew::EventKind>(_: K) {}
/// takes_kind(Signal::TimeOut);
/// ```
pub trait EventKind: Clone + Eq + Hash + Debug + 'static {}

impl<T> EventKind for T where T: Clone + Eq + Hash + Debug + 'static {}

// ── Event ID ──────────────────────────────────────────────────────────

/// A unique, strictly-increasing event identifier.
///
/// Two events scheduled at the same time are popped in `EventId` order,
/// which is scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// Deterministic event-ID generator; one per scheduler.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Origin ────────────────────────────────────────────────────────────

/// Where an event came from, as needed to move a local clock when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    /// State that set the timer; `None` for engine-injected events.
    pub state: Option<StateId>,
    /// Clock the delay was measured on.
    pub clock: ClockId,
    /// The raw delay that was requested.
    pub delay: u64,
}

impl Origin {
    /// An event injected by the engine on the reference clock.
    pub fn external(delay: u64) -> Self {
        Origin {
            state: None,
            clock: ClockId::REFERENCE,
            delay,
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single scheduled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<K> {
    /// Unique identifier (monotonically increasing).
    pub id: EventId,
    /// The application tag.
    pub kind: K,
    /// State receiving the event.
    pub target: StateId,
    /// Due time on the reference clock.
    pub scheduled_at: VirtualTime,
    pub origin: Origin,
    /// Set by the scheduler on pop if the event was canceled.
    pub canceled: bool,
}

impl<K: EventKind> Event<K> {
    pub fn new(
        id: EventId,
        kind: K,
        target: StateId,
        scheduled_at: VirtualTime,
        origin: Origin,
    ) -> Self {
        Event {
            id,
            kind,
            target,
            scheduled_at,
            origin,
            canceled: false,
        }
    }
}

impl<K: Debug> std::fmt::Display for Event<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?} → {} @ {}",
            self.id, self.kind, self.target, self.scheduled_at
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_monotonic() {
        let mut gen = EventIdGen::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(gen.peek().raw(), 2);
        assert!(a < b);
    }

    #[test]
    fn test_external_origin_uses_reference_clock() {
        let origin = Origin::external(7);
        assert!(origin.clock.is_reference());
        assert_eq!(origin.state, None);
        assert_eq!(origin.delay, 7);
    }

    #[test]
    fn test_event_display() {
        let e = Event::new(
            EventId::new(42),
            "TimeOut",
            StateId::new(3),
            VirtualTime::new(0),
            Origin::external(0),
        );
        assert_eq!(e.to_string(), "E#42 \"TimeOut\" → S3 @ 0.000000000s");
    }
}

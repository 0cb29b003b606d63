/// Deterministic event queue.
///
/// A `BinaryHeap` keyed by `(scheduled_at, event_id)` with the ordering
/// reversed so the smallest key pops first. Event IDs grow with every
/// push, so equal-time events leave in the order they were scheduled.
///
/// Canceled events stay in the heap and are flagged when popped; under
/// heavy cancellation the heap grows with dead entries until they drain.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::clock::ClockId;
use crate::event::{Event, EventId, EventIdGen, EventKind, Origin};
use crate::state::StateId;
use crate::time::VirtualTime;

/// Heap entry ordered by `(scheduled_at, id)`, reversed for min-heap use.
#[derive(Debug, Clone)]
struct Pending<K>(Event<K>);

impl<K> Pending<K> {
    fn key(&self) -> (VirtualTime, EventId) {
        (self.0.scheduled_at, self.0.id)
    }
}

impl<K> PartialEq for Pending<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<K> Eq for Pending<K> {}

impl<K> Ord for Pending<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse so that BinaryHeap pops the *smallest* key first.
        other.key().cmp(&self.key())
    }
}

impl<K> PartialOrd for Pending<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The engine's event queue.
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    queue: BinaryHeap<Pending<K>>,
    id_gen: EventIdGen,
    /// Ids still in the heap.
    pending: HashSet<EventId>,
    canceled: HashSet<EventId>,
}

impl<K: EventKind> Scheduler<K> {
    pub fn new() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            id_gen: EventIdGen::new(),
            pending: HashSet::new(),
            canceled: HashSet::new(),
        }
    }

    /// Insert an event due at `at` on the reference clock.
    pub fn push(&mut self, at: VirtualTime, kind: K, target: StateId, origin: Origin) -> EventId {
        let id = self.id_gen.next_id();
        self.pending.insert(id);
        self.queue
            .push(Pending(Event::new(id, kind, target, at, origin)));
        id
    }

    /// Pop the next event (earliest time, lowest ID), with its `canceled`
    /// flag filled in.
    pub fn pop_next(&mut self) -> Option<Event<K>> {
        let Pending(mut event) = self.queue.pop()?;
        self.pending.remove(&event.id);
        event.canceled = self.canceled.remove(&event.id);
        Some(event)
    }

    /// Peek at the next event without removing it.
    pub fn peek_next(&self) -> Option<&Event<K>> {
        self.queue.peek().map(|p| &p.0)
    }

    /// Mark a pending event canceled. Returns `false` if the event is no
    /// longer queued or is already canceled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.contains(&id) && self.canceled.insert(id)
    }

    pub fn is_canceled(&self, id: EventId) -> bool {
        self.canceled.contains(&id)
    }

    /// Cancel every pending event whose delay was measured on `clock`.
    ///
    /// Returns the number of newly canceled events.
    pub fn cancel_clock_events(&mut self, clock: ClockId) -> usize {
        let ids: Vec<EventId> = self
            .queue
            .iter()
            .filter(|p| p.0.origin.clock == clock)
            .map(|p| p.0.id)
            .collect();
        ids.into_iter().filter(|id| self.canceled.insert(*id)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of stored events, canceled ones included.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns the next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Drain all events in pop order into a `Vec`.
    pub fn drain_ordered(&mut self) -> Vec<Event<K>> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.pop_next() {
            events.push(e);
        }
        events
    }
}

impl<K: EventKind> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn target() -> StateId {
        StateId::new(0)
    }

    #[test]
    fn test_fifo_at_same_time() {
        let mut sched = Scheduler::new();

        sched.push(VirtualTime::new(10), "first", target(), Origin::external(10));
        sched.push(VirtualTime::new(10), "second", target(), Origin::external(10));
        sched.push(VirtualTime::new(10), "third", target(), Origin::external(10));

        let kinds: Vec<_> = sched.drain_ordered().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();

        sched.push(VirtualTime::new(30), "late", target(), Origin::external(30));
        sched.push(VirtualTime::new(10), "early", target(), Origin::external(10));
        sched.push(VirtualTime::new(20), "mid", target(), Origin::external(20));

        assert_eq!(sched.peek_next().map(|e| e.kind), Some("early"));
        let times: Vec<_> = sched
            .drain_ordered()
            .into_iter()
            .map(|e| e.scheduled_at.ticks())
            .collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_canceled_events_stay_queued() {
        let mut sched = Scheduler::new();
        let a = sched.push(VirtualTime::new(1), "a", target(), Origin::external(1));
        sched.push(VirtualTime::new(2), "b", target(), Origin::external(2));

        assert!(sched.cancel(a));
        assert!(!sched.cancel(a));
        assert!(!sched.cancel(EventId::new(99)));
        assert_eq!(sched.len(), 2);

        let first = sched.pop_next().unwrap();
        assert_eq!(first.id, a);
        assert!(first.canceled);
        assert!(!sched.is_canceled(a));
        assert!(!sched.pop_next().unwrap().canceled);
        assert!(!sched.cancel(a));
    }

    #[test]
    fn test_cancel_only_reaches_queued_events() {
        let mut sched = Scheduler::new();
        let fired = sched.push(VirtualTime::new(1), "fired", target(), Origin::external(1));
        let waiting = sched.push(VirtualTime::new(5), "waiting", target(), Origin::external(5));
        assert_eq!(sched.pop_next().map(|e| e.id), Some(fired));

        assert!(!sched.cancel(fired));
        assert!(!sched.is_canceled(fired));
        assert!(sched.cancel(waiting));
        assert!(sched.pop_next().unwrap().canceled);
        assert!(!sched.cancel(waiting));
        assert!(sched.is_empty());
    }

    #[test]
    fn test_cancel_clock_events() {
        let mut sched = Scheduler::new();
        let on_reference = Origin {
            state: Some(StateId::new(1)),
            clock: ClockId::REFERENCE,
            delay: 0,
        };
        sched.push(VirtualTime::new(1), "ref", target(), on_reference);
        sched.push(VirtualTime::new(2), "ref", target(), on_reference);
        assert_eq!(sched.cancel_clock_events(ClockId::REFERENCE), 2);
        assert_eq!(sched.cancel_clock_events(ClockId::REFERENCE), 0);
        assert!(sched.drain_ordered().iter().all(|e| e.canceled));
    }

    #[test]
    fn test_empty_scheduler() {
        let mut sched: Scheduler<u8> = Scheduler::new();
        assert!(sched.is_empty());
        assert_eq!(sched.len(), 0);
        assert!(sched.pop_next().is_none());
        assert_eq!(sched.next_event_id(), EventId::new(0));
    }

    proptest! {
        #[test]
        fn prop_pop_order_is_time_then_push_order(
            times in proptest::collection::vec(0u64..50, 0..200),
        ) {
            let mut sched = Scheduler::new();
            for (seq, t) in times.iter().enumerate() {
                sched.push(VirtualTime::new(*t), seq, target(), Origin::external(*t));
            }
            let popped = sched.drain_ordered();
            prop_assert_eq!(popped.len(), times.len());
            for pair in popped.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.scheduled_at <= b.scheduled_at);
                if a.scheduled_at == b.scheduled_at {
                    prop_assert!(a.kind < b.kind);
                }
            }
        }
    }
}

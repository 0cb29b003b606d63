//! TraceEntry: records every event dispatched to a state.

use crate::event::EventId;
use crate::time::VirtualTime;

use super::id::StateId;

/// A record of a single dispatched event.
///
/// Appended by the engine when `EngineConfig::record_trace` is set.
/// Canceled events and events whose target was deleted are not traced.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry<K> {
    /// Reference time at which the event was dispatched.
    pub time: VirtualTime,
    pub event_id: EventId,
    /// The state that received the event.
    pub target: StateId,
    pub kind: K,
}

impl<K: std::fmt::Debug> std::fmt::Display for TraceEntry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[T={} E=#{} S={}] {:?}",
            self.time.ticks(),
            self.event_id.raw(),
            self.target.raw(),
            self.kind,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let entry = TraceEntry {
            time: VirtualTime::new(50),
            event_id: EventId::new(3),
            target: StateId::new(1),
            kind: "TimeOut",
        };
        assert_eq!(entry.to_string(), "[T=50 E=#3 S=1] \"TimeOut\"");
    }
}

//! Engine configuration.

/// Default ceiling on processed events, bounding runaway simulations.
pub const DEFAULT_MAX_EVENTS: u64 = 1_000_000;

/// Tunables for an [`Engine`](crate::Engine).
///
/// ```rust
/// use skew::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_max_events(10_000)
///     .with_trace(true);
/// assert_eq!(config.max_events, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct EngineConfig {
    /// Event-counter ceiling used when a run names neither steps nor a cap.
    pub max_events: u64,
    /// Record a [`TraceEntry`](crate::TraceEntry) for every dispatched event.
    pub record_trace: bool,
}

impl EngineConfig {
    /// Override the default event ceiling.
    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = max_events;
        self
    }

    /// Enable or disable the dispatch trace.
    pub fn with_trace(mut self, record_trace: bool) -> Self {
        self.record_trace = record_trace;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_events: DEFAULT_MAX_EVENTS,
            record_trace: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.max_events, DEFAULT_MAX_EVENTS);
        assert!(!c.record_trace);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_partial_json_uses_defaults() {
        let c: EngineConfig = serde_json::from_str(r#"{ "record_trace": true }"#).unwrap();
        assert!(c.record_trace);
        assert_eq!(c.max_events, DEFAULT_MAX_EVENTS);
    }
}

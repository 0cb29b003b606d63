//! State ID: the registry's handle for a live state.

/// A process-unique identifier assigned when a state is registered.
///
/// IDs are never reused within one engine, so a stale ID held by a
/// pending event simply fails to resolve after its state is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(u64);

impl StateId {
    #[inline]
    pub fn new(id: u64) -> Self {
        StateId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

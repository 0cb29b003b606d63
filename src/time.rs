/// Virtual time and unit constants for the simulation.
///
/// All absolute and relative times are integer nanosecond counts. Time
/// advances only when the engine pops events, never from wall-clock
/// observation.

// ── Units ─────────────────────────────────────────────────────────────

/// Nanoseconds are the base time unit of the simulation.
pub const NSEC: u64 = 1;
/// One microsecond.
pub const USEC: u64 = 1000 * NSEC;
/// One millisecond.
pub const MSEC: u64 = 1000 * USEC;
/// IEEE 802.11 time unit (1024 µs).
pub const TU: u64 = 1024 * USEC;
/// One second.
pub const SEC: u64 = 1000 * MSEC;
/// One hour.
pub const HOUR: u64 = 3600 * SEC;
/// One day.
pub const DAY: u64 = 24 * HOUR;

/// Speed of light in meters per second.
pub const SPEED_OF_LIGHT: u64 = 299_792_458;
/// Propagation time of one meter, truncated to whole nanoseconds.
pub const NSEC_PER_METER: u64 = SEC / SPEED_OF_LIGHT;

/// Clock drift is stored in parts per billion.
pub const PPB: i64 = 1;
/// Parts per million, expressed in PPB.
pub const PPM: i64 = 1000 * PPB;

// ── VirtualTime ───────────────────────────────────────────────────────

/// A point on a simulated time base, in nanoseconds.
///
/// The same type is used for the reference clock and for local clocks;
/// which base a value belongs to is up to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// Create a new `VirtualTime` from a raw nanosecond count.
    #[inline]
    pub fn new(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    /// Return the raw nanosecond count.
    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Advance time by `delta` nanoseconds.
    /// Returns `None` on overflow.
    #[inline]
    pub fn advance(self, delta: u64) -> Option<VirtualTime> {
        self.0.checked_add(delta).map(VirtualTime)
    }

    /// Alias for `advance`; reads better where timers are scheduled.
    #[inline]
    pub fn plus(self, delay: u64) -> Option<VirtualTime> {
        self.advance(delay)
    }

    /// Returns the duration between two points in time, or `None` if
    /// `other` is after `self`.
    #[inline]
    pub fn duration_since(self, other: VirtualTime) -> Option<u64> {
        self.0.checked_sub(other.0)
    }

    /// Fractional seconds, for log output.
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / SEC as f64
    }
}

impl From<u64> for VirtualTime {
    fn from(ticks: u64) -> Self {
        VirtualTime(ticks)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_ladder() {
        assert_eq!(USEC, 1_000);
        assert_eq!(MSEC, 1_000_000);
        assert_eq!(SEC, 1_000_000_000);
        assert_eq!(TU, 1_024_000);
        assert_eq!(DAY, 86_400 * SEC);
        assert_eq!(NSEC_PER_METER, 3);
        assert_eq!(-5 * PPM, -5_000);
    }

    #[test]
    fn test_ordering() {
        let t1 = VirtualTime::new(10);
        let t2 = VirtualTime::new(20);
        assert!(t1 < t2);
        assert_eq!(VirtualTime::default(), VirtualTime::ZERO);
    }

    #[test]
    fn test_advance_overflow() {
        assert_eq!(VirtualTime::new(100).plus(50), Some(VirtualTime::new(150)));
        assert!(VirtualTime::new(u64::MAX).advance(1).is_none());
    }

    #[test]
    fn test_duration_since() {
        let t1 = VirtualTime::new(10);
        let t2 = VirtualTime::new(30);
        assert_eq!(t2.duration_since(t1), Some(20));
        assert_eq!(t1.duration_since(t2), None);
    }

    #[test]
    fn test_display_in_seconds() {
        let t = VirtualTime::new(1_500_000_000);
        assert_eq!(t.to_string(), "1.500000000s");
    }
}

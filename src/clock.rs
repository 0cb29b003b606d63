//! Local clocks that drift and offset against the reference clock.
//!
//! A clock keeps its own local time plus a `zero_offset` chosen so that
//!
//! ```text
//! local     = reference * (1 + drift * 1e-9) + zero_offset
//! reference = (local - zero_offset) / (1 + drift * 1e-9)
//! ```
//!
//! Local time moves forward only when the engine pops an event that was
//! scheduled from the clock, and then by the raw delay the timer asked
//! for. The delay is not drift-corrected; `zero_offset` still reflects the
//! last explicit `set`, so `master_time` keeps converting against it.

use crate::error::{SimError, SimResult};
use crate::time::VirtualTime;

const PPB_SCALE: i128 = 1_000_000_000;

// ── ClockId ───────────────────────────────────────────────────────────

/// Handle of a clock inside the engine's [`ClockBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockId(u32);

impl ClockId {
    /// The engine's reference clock.
    pub const REFERENCE: ClockId = ClockId(0);

    /// Return the underlying index.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_reference(self) -> bool {
        self == ClockId::REFERENCE
    }
}

impl std::fmt::Display for ClockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

// ── Clock ─────────────────────────────────────────────────────────────

/// A simulated time base.
///
/// The reference clock has drift 0, no offset, and refuses `set`; it is
/// moved only by the engine through [`Clock::advance_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Clock {
    time: VirtualTime,
    drift: i64,
    zero_offset: i64,
    reference: bool,
}

impl Clock {
    /// A reference clock at time zero.
    pub fn reference() -> Self {
        Clock {
            time: VirtualTime::ZERO,
            drift: 0,
            zero_offset: 0,
            reference: true,
        }
    }

    /// A drifting clock reading `time` when the reference reads
    /// `reference_now`.
    pub fn local(time: VirtualTime, drift: i64, reference_now: VirtualTime) -> SimResult<Self> {
        let mut clock = Clock {
            time,
            drift: 0,
            zero_offset: 0,
            reference: false,
        };
        clock.set(None, Some(drift), reference_now)?;
        Ok(clock)
    }

    /// Current local time.
    #[inline]
    pub fn time(&self) -> VirtualTime {
        self.time
    }

    /// Drift in parts per billion.
    #[inline]
    pub fn drift(&self) -> i64 {
        self.drift
    }

    #[inline]
    pub fn zero_offset(&self) -> i64 {
        self.zero_offset
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        self.reference
    }

    /// Reset local time and/or drift and recompute `zero_offset` against
    /// `reference_now`. Fields left as `None` keep their value.
    pub fn set(
        &mut self,
        time: Option<VirtualTime>,
        drift: Option<i64>,
        reference_now: VirtualTime,
    ) -> SimResult<()> {
        if self.reference {
            return Err(SimError::ReferenceClockImmutable);
        }
        if let Some(drift) = drift {
            if i128::from(drift) <= -PPB_SCALE {
                return Err(SimError::InvalidDrift(drift));
            }
            self.drift = drift;
        }
        if let Some(time) = time {
            self.time = time;
        }
        // zero_offset = local - reference * (1 + drift / 1e9)
        let scaled = i128::from(reference_now.ticks()) * self.rate() / PPB_SCALE;
        self.zero_offset = (i128::from(self.time.ticks()) - scaled) as i64;
        Ok(())
    }

    /// Offset of local time from the reference time (`local - reference`).
    pub fn offset(&self, reference_now: VirtualTime) -> i64 {
        (i128::from(self.time.ticks()) - i128::from(reference_now.ticks())) as i64
    }

    /// Map a local time to the equivalent reference time.
    ///
    /// Returns `None` when the result falls outside `VirtualTime`.
    pub fn master_time(&self, local: VirtualTime) -> Option<VirtualTime> {
        let shifted = i128::from(local.ticks()) - i128::from(self.zero_offset);
        to_time((shifted * PPB_SCALE).div_euclid(self.rate()))
    }

    /// Map a reference time to the local time this clock reads then.
    pub fn local_at(&self, reference: VirtualTime) -> Option<VirtualTime> {
        let scaled = (i128::from(reference.ticks()) * self.rate()).div_euclid(PPB_SCALE);
        to_time(scaled + i128::from(self.zero_offset))
    }

    /// Move local time forward by a raw delta.
    ///
    /// Returns the new local time, or `None` on overflow (time unchanged).
    pub fn advance_local(&mut self, delta: u64) -> Option<VirtualTime> {
        self.time = self.time.advance(delta)?;
        Some(self.time)
    }

    /// Move the clock forward to `new_time`.
    ///
    /// Returns `false` and leaves the clock unchanged if `new_time` is in
    /// its past.
    pub fn advance_to(&mut self, new_time: VirtualTime) -> bool {
        if new_time < self.time {
            return false;
        }
        self.time = new_time;
        true
    }

    fn rate(&self) -> i128 {
        PPB_SCALE + i128::from(self.drift)
    }
}

fn to_time(ticks: i128) -> Option<VirtualTime> {
    u64::try_from(ticks).ok().map(VirtualTime::new)
}

// ── ClockBank ─────────────────────────────────────────────────────────

/// Arena of every clock the engine knows about.
///
/// Index 0 is always the reference clock. Clocks are shared by handle,
/// so rebinding a subtree to one clock is a matter of copying its id.
#[derive(Debug, Clone)]
pub struct ClockBank {
    clocks: Vec<Clock>,
}

impl ClockBank {
    /// A bank holding only the reference clock.
    pub fn new() -> Self {
        ClockBank {
            clocks: vec![Clock::reference()],
        }
    }

    /// Current reference time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.clocks[0].time()
    }

    pub fn reference(&self) -> &Clock {
        &self.clocks[0]
    }

    pub(crate) fn reference_mut(&mut self) -> &mut Clock {
        &mut self.clocks[0]
    }

    /// Store a new clock and return its handle.
    pub fn add(&mut self, clock: Clock) -> ClockId {
        let id = ClockId(self.clocks.len() as u32);
        self.clocks.push(clock);
        id
    }

    pub fn get(&self, id: ClockId) -> SimResult<&Clock> {
        self.clocks
            .get(id.0 as usize)
            .ok_or(SimError::ClockNotFound(id))
    }

    pub fn get_mut(&mut self, id: ClockId) -> SimResult<&mut Clock> {
        self.clocks
            .get_mut(id.0 as usize)
            .ok_or(SimError::ClockNotFound(id))
    }

    /// Apply [`Clock::set`] to a stored clock against the current
    /// reference time.
    pub fn reset(
        &mut self,
        id: ClockId,
        time: Option<VirtualTime>,
        drift: Option<i64>,
    ) -> SimResult<()> {
        let now = self.now();
        self.get_mut(id)?.set(time, drift, now)
    }

    /// Number of clocks, the reference clock included.
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }
}

impl Default for ClockBank {
    fn default() -> Self {
        Self::new()
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Rem, Sub, SubAssign};
use std::time::{Duration, Instant};

/// Ticks per second for `DiscreteTime`. Divisible by every common frame and
/// sample rate (24/25/30/48/50/60 fps, 44.1/48 kHz), so frame-aligned times
/// are exact.
pub const TICKS_PER_SECOND: i64 = 141_120_000;

/// A fixed-point time value counted in integer ticks.
///
/// Timer arithmetic stays in ticks so repeated accumulation never drifts the
/// way floating point seconds do. Raw add/sub wraps like the underlying i64;
/// interval durations detect the wrap and saturate instead (see
/// [`DiscreteTimeInterval::duration`]).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiscreteTime {
    ticks: i64,
}

impl DiscreteTime {
    pub const ZERO: Self = Self { ticks: 0 };
    /// Sentinel for an unbounded range start.
    pub const MIN: Self = Self { ticks: i64::MIN };
    /// Sentinel for an unbounded range end.
    pub const MAX: Self = Self { ticks: i64::MAX };

    pub const fn from_ticks(ticks: i64) -> Self {
        Self { ticks }
    }

    /// Rounds to the nearest representable tick.
    pub fn from_seconds(seconds: f64) -> Self {
        Self { ticks: (seconds * TICKS_PER_SECOND as f64).round() as i64 }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::from_seconds(duration.as_secs_f64())
    }

    pub const fn ticks(self) -> i64 {
        self.ticks
    }

    pub fn as_seconds(self) -> f64 {
        self.ticks as f64 / TICKS_PER_SECOND as f64
    }

    pub fn min(self, other: Self) -> Self {
        Self { ticks: self.ticks.min(other.ticks) }
    }

    pub fn max(self, other: Self) -> Self {
        Self { ticks: self.ticks.max(other.ticks) }
    }

    pub fn abs(self) -> Self {
        Self { ticks: self.ticks.wrapping_abs() }
    }

    /// Scales the tick count by a double, rounding to the nearest tick.
    ///
    /// Rounding is round-half-away-from-zero (`f64::round`); scaling by `s`
    /// and then by `1/s` is not required to round-trip.
    pub fn scale(self, s: f64) -> Self {
        Self { ticks: (self.ticks as f64 * s).round() as i64 }
    }
}

impl Add for DiscreteTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { ticks: self.ticks.wrapping_add(rhs.ticks) }
    }
}

impl AddAssign for DiscreteTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for DiscreteTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { ticks: self.ticks.wrapping_sub(rhs.ticks) }
    }
}

impl SubAssign for DiscreteTime {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for DiscreteTime {
    type Output = Self;
    fn neg(self) -> Self {
        Self { ticks: self.ticks.wrapping_neg() }
    }
}

impl Mul<f64> for DiscreteTime {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}

impl Mul<i64> for DiscreteTime {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self { ticks: self.ticks.wrapping_mul(rhs) }
    }
}

impl Rem for DiscreteTime {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        Self { ticks: self.ticks % rhs.ticks }
    }
}

impl fmt::Debug for DiscreteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiscreteTime({}t / {:.6}s)", self.ticks, self.as_seconds())
    }
}

impl fmt::Display for DiscreteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_seconds())
    }
}

/// A closed time interval, normalized so `start <= end`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DiscreteTimeInterval {
    pub start: DiscreteTime,
    pub end: DiscreteTime,
}

impl DiscreteTimeInterval {
    /// The largest representable interval. Its duration saturates.
    pub const MAX_RANGE: Self = Self { start: DiscreteTime::MIN, end: DiscreteTime::MAX };

    pub fn new(time0: DiscreteTime, time1: DiscreteTime) -> Self {
        Self { start: time0.min(time1), end: time0.max(time1) }
    }

    /// The duration of the interval, saturated at `DiscreteTime::MAX` when
    /// `end - start` overflows, so very large intervals may not satisfy
    /// `end == start + duration`.
    pub fn duration(self) -> DiscreteTime {
        let diff = self.end.ticks().wrapping_sub(self.start.ticks());
        if diff < 0 {
            DiscreteTime::MAX
        } else {
            DiscreteTime::from_ticks(diff)
        }
    }

    /// Closed containment: `start <= t <= end`. Use for clamp-style checks.
    pub fn contains_closed(self, t: DiscreteTime) -> bool {
        t >= self.start && t <= self.end
    }

    /// Half-open containment: `start <= t < end`. Use for activity checks.
    pub fn contains_half_open(self, t: DiscreteTime) -> bool {
        t >= self.start && t < self.end
    }

    pub fn overlaps(self, other: Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn clamp(self, time: DiscreteTime) -> DiscreteTime {
        self.end.min(self.start.max(time))
    }
}

/// Produces per-frame wall-clock deltas for the host loop, split into the
/// scaled / unscaled / real variants [`crate::ecs::TickTime`] carries.
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }

    /// Measures the wall-clock delta since the previous call and expands it
    /// into a tick context with the given global time scale.
    pub fn tick(&mut self, time_scale: f64) -> crate::ecs::TickTime {
        let now = Instant::now();
        let real = DiscreteTime::from_duration(now - self.last);
        self.last = now;
        crate::ecs::TickTime {
            game_delta: real.scale(time_scale),
            unscaled_delta: real,
            real_delta: real,
            time_scale,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_round_trip_is_exact_for_frame_rates() {
        for fps in [24, 25, 30, 48, 50, 60, 120] {
            let dt = DiscreteTime::from_seconds(1.0 / fps as f64);
            assert_eq!(dt.ticks() * fps, TICKS_PER_SECOND, "1/{fps}s must be exact");
        }
    }

    #[test]
    fn accumulation_does_not_drift() {
        let step = DiscreteTime::from_seconds(1.0 / 60.0);
        let mut acc = DiscreteTime::ZERO;
        for _ in 0..60_000 {
            acc += step;
        }
        assert_eq!(acc, DiscreteTime::from_seconds(1000.0));
    }

    #[test]
    fn scale_rounds_to_nearest_tick() {
        let t = DiscreteTime::from_ticks(3);
        assert_eq!(t.scale(0.5).ticks(), 2); // 1.5 rounds away from zero
        assert_eq!(t.scale(1.0 / 3.0).ticks(), 1);
        assert_eq!(DiscreteTime::from_ticks(-3).scale(0.5).ticks(), -2);
    }

    #[test]
    fn interval_normalizes_order() {
        let a = DiscreteTime::from_seconds(5.0);
        let b = DiscreteTime::from_seconds(2.0);
        let interval = DiscreteTimeInterval::new(a, b);
        assert_eq!(interval.start, b);
        assert_eq!(interval.end, a);
    }

    #[test]
    fn interval_duration_saturates_on_overflow() {
        assert_eq!(DiscreteTimeInterval::MAX_RANGE.duration(), DiscreteTime::MAX);
        let small = DiscreteTimeInterval::new(DiscreteTime::ZERO, DiscreteTime::from_seconds(1.0));
        assert_eq!(small.duration(), DiscreteTime::from_seconds(1.0));
    }

    #[test]
    fn containment_half_open_vs_closed() {
        let interval = DiscreteTimeInterval::new(DiscreteTime::ZERO, DiscreteTime::from_seconds(1.0));
        let end = DiscreteTime::from_seconds(1.0);
        assert!(interval.contains_closed(end));
        assert!(!interval.contains_half_open(end));
        assert!(interval.contains_half_open(DiscreteTime::ZERO));
    }

    #[test]
    fn clamp_pins_to_bounds() {
        let interval =
            DiscreteTimeInterval::new(DiscreteTime::from_seconds(1.0), DiscreteTime::from_seconds(2.0));
        assert_eq!(interval.clamp(DiscreteTime::ZERO), DiscreteTime::from_seconds(1.0));
        assert_eq!(interval.clamp(DiscreteTime::from_seconds(3.0)), DiscreteTime::from_seconds(2.0));
        assert_eq!(interval.clamp(DiscreteTime::from_seconds(1.5)), DiscreteTime::from_seconds(1.5));
    }

    #[test]
    fn overlap_checks_both_directions() {
        let a = DiscreteTimeInterval::new(DiscreteTime::ZERO, DiscreteTime::from_seconds(2.0));
        let b = DiscreteTimeInterval::new(DiscreteTime::from_seconds(1.0), DiscreteTime::from_seconds(3.0));
        let c = DiscreteTimeInterval::new(DiscreteTime::from_seconds(5.0), DiscreteTime::from_seconds(6.0));
        assert!(a.overlaps(b));
        assert!(b.overlaps(a));
        assert!(!a.overlaps(c));
    }
}

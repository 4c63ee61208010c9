// Copyright 2026 the Thermocline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic nanosecond time.
//!
//! [`TimePoint`] is a point on the host monotonic clock and [`Duration`] a
//! span between two such points, both in signed nanoseconds. Signedness is
//! load-bearing: per-frame work estimates are formed by subtracting
//! timestamps gathered from asynchronous hardware signals, and an estimate
//! that comes out negative must survive long enough to be rejected rather
//! than wrap.
//!
//! Products of two nanosecond quantities use `i128` intermediates.

use core::fmt;
use core::ops::{Add, AddAssign, Neg, Sub};

/// A point in time on the host monotonic clock, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimePoint(pub i64);

impl TimePoint {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Creates a time point from a raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> i64 {
        self.0
    }

    /// Returns the duration since an earlier time, or zero if `earlier` is
    /// actually later.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for TimePoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub<Duration> for TimePoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Duration) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sub for TimePoint {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimePoint({}ns)", self.0)
    }
}

/// A signed span of time in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub i64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Creates a duration from a nanosecond count.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Creates a duration from a microsecond count.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros * 1_000)
    }

    /// Creates a duration from a millisecond count.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> i64 {
        self.0
    }

    /// Returns `true` when the span is below zero.
    #[inline]
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Duration {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Duration {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}ns)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_constructors_scale_to_nanos() {
        assert_eq!(Duration::from_micros(150).nanos(), 150_000);
        assert_eq!(Duration::from_millis(80).nanos(), 80_000_000);
        assert_eq!(Duration::from_nanos(-5).nanos(), -5);
    }

    #[test]
    fn time_point_duration_ops() {
        let t = TimePoint::from_nanos(1_000);
        let d = Duration::from_nanos(200);
        assert_eq!((t + d).nanos(), 1_200);
        assert_eq!((t - d).nanos(), 800);
        assert_eq!(t - TimePoint::from_nanos(400), Duration::from_nanos(600));
    }

    #[test]
    fn subtraction_may_go_negative() {
        let earlier = TimePoint::from_nanos(100);
        let later = TimePoint::from_nanos(400);
        let negative = earlier - later;
        assert!(negative.is_negative(), "reversed subtraction is negative");
        assert_eq!(negative.nanos(), -300);
        assert_eq!(
            earlier.saturating_duration_since(later),
            Duration::ZERO,
            "saturating variant clamps at zero"
        );
    }

    #[test]
    fn max_picks_later_operand() {
        let a = TimePoint::from_nanos(5);
        let b = TimePoint::from_nanos(9);
        assert_eq!(a.max(b), b);
        assert_eq!(b.max(a), b);
        assert_eq!(
            Duration::from_nanos(3).max(Duration::from_nanos(-7)),
            Duration::from_nanos(3)
        );
    }

    #[test]
    fn duration_accumulates() {
        let mut total = Duration::ZERO;
        total += Duration::from_micros(150);
        total += Duration::from_micros(250);
        assert_eq!(total, Duration::from_micros(400));
        assert_eq!(-total, Duration::from_micros(-400));
    }

    #[test]
    fn saturating_ops_clamp_at_bounds() {
        let huge = Duration::from_nanos(i64::MAX);
        assert_eq!(huge.saturating_add(Duration::from_nanos(1)), huge);
        let tiny = Duration::from_nanos(i64::MIN);
        assert_eq!(tiny.saturating_sub(Duration::from_nanos(1)), tiny);
    }
}

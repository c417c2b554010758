// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic presentation time in nanoseconds.
//!
//! [`HostTime`] represents a point in time on whatever monotonic clock the
//! display collaborator reads (typically `CLOCK_MONOTONIC` or the
//! compositor-announced presentation clock). Presentation protocols report
//! time in nanoseconds, so the unit is fixed to nanoseconds rather than
//! platform ticks.
//!
//! [`Duration`] represents a span in the same unit. Arithmetic that could
//! overflow saturates or is checked; a bogus timestamp from a compositor must
//! not panic the tracker.

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time expressed as nanoseconds on a monotonic clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Creates a [`HostTime`] from a nanosecond value.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Assembles a [`HostTime`] from a split timespec as reported by
    /// presentation protocols: seconds in two 32-bit halves plus a nanosecond
    /// remainder.
    ///
    /// Saturates at `u64::MAX` nanoseconds (a little over 584 years of
    /// uptime), so a corrupt high word cannot wrap the clock.
    #[inline]
    #[must_use]
    pub const fn from_timespec_parts(sec_hi: u32, sec_lo: u32, nsec: u32) -> Self {
        let secs = ((sec_hi as u64) << 32) | sec_lo as u64;
        Self(secs.saturating_mul(1_000_000_000).saturating_add(nsec as u64))
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Returns the duration since an earlier time, or `None` if `earlier` is
    /// after `self`.
    #[inline]
    #[must_use]
    pub const fn checked_duration_since(self, earlier: Self) -> Option<Duration> {
        match self.0.checked_sub(earlier.0) {
            Some(d) => Some(Duration(d)),
            None => None,
        }
    }

    /// Checked addition of a duration.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }

    /// Saturating addition of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }

    /// Checked subtraction of a duration.
    #[inline]
    #[must_use]
    pub const fn checked_sub(self, duration: Duration) -> Option<Self> {
        match self.0.checked_sub(duration.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Duration) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ns)", self.0)
    }
}

/// A duration in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Creates a duration from a nanosecond value.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a duration from a millisecond value.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the duration in fractional milliseconds.
    #[inline]
    #[must_use]
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Whether this duration is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
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

    /// Saturating multiplication by a count, e.g. a deadline of `n` refresh
    /// periods.
    #[inline]
    #[must_use]
    pub const fn saturating_mul(self, rhs: u32) -> Self {
        Self(self.0.saturating_mul(rhs as u64))
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
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
    fn timespec_assembly() {
        // 1s + 500ns, low word only.
        let t = HostTime::from_timespec_parts(0, 1, 500);
        assert_eq!(t.as_nanos(), 1_000_000_500, "seconds scale to nanoseconds");

        // High word contributes 2^32 seconds.
        let t = HostTime::from_timespec_parts(1, 0, 0);
        assert_eq!(t.as_nanos(), (1_u64 << 32) * 1_000_000_000);
    }

    #[test]
    fn timespec_saturates_instead_of_wrapping() {
        let t = HostTime::from_timespec_parts(u32::MAX, u32::MAX, 999_999_999);
        assert_eq!(t.as_nanos(), u64::MAX, "corrupt high word saturates");
    }

    #[test]
    fn duration_arithmetic() {
        let a = Duration(100);
        let b = Duration(30);
        assert_eq!((a + b).as_nanos(), 130);
        assert_eq!((a - b).as_nanos(), 70);
        assert_eq!(a.saturating_sub(Duration(200)), Duration::ZERO);
        assert_eq!(Duration(u64::MAX).saturating_add(b), Duration(u64::MAX));
    }

    #[test]
    fn duration_scaling() {
        assert_eq!(Duration::from_millis(16).as_nanos(), 16_000_000);
        assert_eq!(Duration::from_nanos(16_666_667).saturating_mul(3).as_nanos(), 50_000_001);
        let ms = Duration::from_nanos(16_666_667).as_millis_f64();
        assert!((ms - 16.666_667).abs() < 1e-9, "fractional milliseconds");
    }

    #[test]
    fn host_time_duration_ops() {
        let t = HostTime(1000);
        let d = Duration(200);
        assert_eq!((t + d).as_nanos(), 1200);
        assert_eq!((t - d).as_nanos(), 800);
        assert_eq!(t.saturating_duration_since(HostTime(1500)), Duration::ZERO);
        assert_eq!(t.saturating_duration_since(HostTime(400)), Duration(600));
        assert_eq!(t.checked_duration_since(HostTime(1500)), None);
        assert_eq!(HostTime(u64::MAX).checked_add(d), None);
        assert_eq!(HostTime(u64::MAX).saturating_add(d), HostTime(u64::MAX));
    }
}

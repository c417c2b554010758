// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clock selection and reads for presentation timestamps.
//!
//! `wp_presentation` announces which POSIX clock its timestamps use via the
//! `clock_id` event. Deadline arithmetic only works when "now" and the
//! feedback timestamps come from the same clock, so the binding reads the
//! announced clock once known and `CLOCK_MONOTONIC` before that.

use retrace_core::time::HostTime;
use rustix::time::{ClockId as PosixClockId, Timespec, clock_gettime};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Clock source used for pacing timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Clock {
    /// `CLOCK_MONOTONIC` fallback clock.
    #[default]
    Monotonic,
    /// Clock selected from `wp_presentation.clock_id`.
    Presentation(PosixClockId),
}

impl Clock {
    #[must_use]
    const fn posix_clock_id(self) -> PosixClockId {
        match self {
            Self::Monotonic => PosixClockId::Monotonic,
            Self::Presentation(clock_id) => clock_id,
        }
    }
}

/// Maps a raw `clockid_t` from the `clock_id` event to a [`Clock`].
///
/// Compositors in practice announce `CLOCK_MONOTONIC`; unrecognized ids fall
/// back to it rather than failing the binding.
#[must_use]
pub fn presentation_clock_from_id(clk_id: u32) -> Clock {
    // Raw values per linux/time.h.
    let id = match clk_id {
        0 => PosixClockId::Realtime,
        1 => PosixClockId::Monotonic,
        4 => PosixClockId::MonotonicRaw,
        7 => PosixClockId::Boottime,
        _ => PosixClockId::Monotonic,
    };
    Clock::Presentation(id)
}

/// Returns the current monotonic time in nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    now_for_clock(Clock::Monotonic)
}

/// Returns the current time on the given clock in nanoseconds.
#[must_use]
pub fn now_for_clock(clock: Clock) -> HostTime {
    let timespec = clock_gettime(clock.posix_clock_id());
    timespec_to_host_time(timespec)
}

fn timespec_to_host_time(timespec: Timespec) -> HostTime {
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(999_999_999);

    let nanos_u128 = u128::from(seconds)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(u128::from(nanos));
    let nanos = u64::try_from(nanos_u128).unwrap_or(u64::MAX);
    HostTime(nanos)
}

#[cfg(test)]
mod tests {
    use retrace_core::time::HostTime;
    use rustix::time::{ClockId as PosixClockId, Timespec};

    use super::{Clock, now, now_for_clock, presentation_clock_from_id, timespec_to_host_time};

    #[test]
    fn now_is_monotonic_non_decreasing() {
        let first = now();
        let second = now();
        assert!(second >= first, "monotonic clock should not go backwards");
    }

    #[test]
    fn presentation_clock_variant_is_usable() {
        let t = now_for_clock(Clock::Presentation(PosixClockId::Monotonic));
        assert!(t.as_nanos() > 0, "clock_gettime(monotonic) should be positive");
    }

    #[test]
    fn raw_clock_ids_map_to_known_clocks() {
        assert_eq!(
            presentation_clock_from_id(1),
            Clock::Presentation(PosixClockId::Monotonic)
        );
        assert_eq!(
            presentation_clock_from_id(0),
            Clock::Presentation(PosixClockId::Realtime)
        );
        assert_eq!(
            presentation_clock_from_id(999),
            Clock::Presentation(PosixClockId::Monotonic),
            "unknown ids fall back to monotonic"
        );
    }

    #[test]
    fn timespec_conversion_builds_nanoseconds() {
        let input = Timespec {
            tv_sec: 12,
            tv_nsec: 345_678_901,
        };
        let expected = HostTime(12 * 1_000_000_000 + 345_678_901);
        assert_eq!(timespec_to_host_time(input), expected);
    }

    #[test]
    fn timespec_conversion_saturates_on_large_values() {
        let input = Timespec {
            tv_sec: i64::MAX,
            tv_nsec: 999_999_999,
        };
        assert_eq!(timespec_to_host_time(input), HostTime(u64::MAX));
    }
}

// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Refresh-interval estimation.
//!
//! The pacer needs a current refresh period to size its feedback deadline
//! (`timeout_intervals × refresh`). Displays report their nominal period with
//! presented feedback, but variable-rate displays report zero, so
//! [`RefreshEstimator`] blends two signals: protocol-reported periods and
//! deltas between consecutive presented timestamps.
//!
//! A presented delta well above the current estimate means cycles were
//! skipped, not that the display slowed down, so deltas beyond
//! [`SKIP_THRESHOLD`] times the estimate are rejected as cadence samples.

use crate::time::{Duration, HostTime};

/// Nominal 60 Hz refresh period.
pub const REFRESH_60HZ: Duration = Duration::from_nanos(16_666_667);

/// Presented-interval factor above which a delta is a skipped cycle rather
/// than a cadence change.
pub const SKIP_THRESHOLD: f64 = 1.5;

const EMA_ALPHA: f64 = 0.1;

/// Exponential moving average tracker.
///
/// Holds nanosecond magnitudes, so it uses `f64` rather than a ratio-sized
/// float.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f64,
    alpha: f64,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f64) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f64) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    const fn get(&self) -> f64 {
        self.value
    }

    const fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Smoothed estimate of the display's refresh period.
#[derive(Clone, Copy, Debug)]
pub struct RefreshEstimator {
    ema: Ema,
    nominal: Duration,
    last_presented: Option<HostTime>,
}

impl RefreshEstimator {
    /// Creates an estimator seeded with a nominal period.
    ///
    /// A zero nominal falls back to [`REFRESH_60HZ`] so the estimate is
    /// never zero.
    #[must_use]
    pub fn new(nominal: Duration) -> Self {
        let nominal = if nominal.is_zero() {
            REFRESH_60HZ
        } else {
            nominal
        };
        Self {
            ema: Ema::new(EMA_ALPHA),
            nominal,
            last_presented: None,
        }
    }

    /// Feeds a protocol-reported refresh period. Zero (unknown or variable
    /// rate) is ignored.
    pub fn observe_reported(&mut self, refresh: Duration) {
        if refresh.is_zero() {
            return;
        }
        self.ema.update(refresh.as_nanos() as f64);
    }

    /// Feeds a presented timestamp. Consecutive deltas close to the current
    /// estimate refine it; deltas outside `[estimate / 2, estimate × 1.5]`
    /// are skipped cycles or same-cycle presents and are rejected.
    pub fn observe_presented(&mut self, timestamp: HostTime) {
        let Some(last) = self.last_presented.replace(timestamp) else {
            return;
        };
        let Some(delta) = timestamp.checked_duration_since(last) else {
            return;
        };
        let delta_ns = delta.as_nanos() as f64;
        let estimate_ns = self.estimate().as_nanos() as f64;
        if delta_ns >= estimate_ns / 2.0 && delta_ns <= estimate_ns * SKIP_THRESHOLD {
            self.ema.update(delta_ns);
        }
    }

    /// The current refresh-period estimate. Never zero.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "EMA over realistic refresh periods fits u64 nanoseconds"
    )]
    pub fn estimate(&self) -> Duration {
        if self.ema.is_initialized() {
            let nanos = self.ema.get().max(1.0) as u64;
            Duration::from_nanos(nanos)
        } else {
            self.nominal
        }
    }

    /// The current estimate expressed in hertz.
    #[must_use]
    pub fn estimated_hz(&self) -> f64 {
        1_000_000_000.0 / self.estimate().as_nanos() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_with_nominal_until_observed() {
        let est = RefreshEstimator::new(Duration::from_nanos(8_333_333));
        assert_eq!(est.estimate(), Duration::from_nanos(8_333_333));

        let est = RefreshEstimator::new(Duration::ZERO);
        assert_eq!(est.estimate(), REFRESH_60HZ, "zero nominal falls back");
    }

    #[test]
    fn reported_refresh_overrides_nominal() {
        let mut est = RefreshEstimator::new(REFRESH_60HZ);
        est.observe_reported(Duration::from_nanos(8_333_333));
        assert_eq!(est.estimate(), Duration::from_nanos(8_333_333), "first sample seeds the average");

        est.observe_reported(Duration::ZERO);
        assert_eq!(est.estimate(), Duration::from_nanos(8_333_333), "zero report ignored");
    }

    #[test]
    fn presented_deltas_refine_estimate() {
        let mut est = RefreshEstimator::new(REFRESH_60HZ);
        let period = 16_666_667_u64;
        for i in 0..10 {
            est.observe_presented(HostTime(i * period));
        }
        let got = est.estimate().as_nanos();
        assert!(
            got.abs_diff(period) <= 1,
            "steady cadence converges to the true period, got {got}"
        );
        assert!((est.estimated_hz() - 60.0).abs() < 0.01);
    }

    #[test]
    fn skipped_cycles_are_not_cadence_samples() {
        let mut est = RefreshEstimator::new(REFRESH_60HZ);
        est.observe_presented(HostTime(0));
        // Two cycles of silence, then a present: 33.3ms delta.
        est.observe_presented(HostTime(33_333_334));
        assert_eq!(est.estimate(), REFRESH_60HZ, "2x delta rejected");

        // Same-cycle double present is rejected too.
        est.observe_presented(HostTime(33_433_334));
        assert_eq!(est.estimate(), REFRESH_60HZ, "tiny delta rejected");
    }

    #[test]
    fn estimate_is_never_zero() {
        let mut est = RefreshEstimator::new(Duration::ZERO);
        est.observe_presented(HostTime(0));
        est.observe_presented(HostTime(0));
        assert!(!est.estimate().is_zero());
    }
}

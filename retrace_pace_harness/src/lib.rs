// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic display scripting, pacing metrics, and grading for demo
//! harnesses.
//!
//! [`ScriptedDisplay`] drives a real [`PresentationPacer`] against a
//! simulated vsync grid with configurable pathologies, so every
//! compositor behavior the pacer must absorb — drops, silence, sequence
//! jumps, stale sequences — can be reproduced without a display server.
//! [`PaceTracker`] folds the outcomes into a rolling quality report, and
//! [`status_line`] renders the overlay statistics format.

use std::fmt::Write as _;

use retrace_core::feedback::{FeedbackEvent, PresentFlags, PresentationStats};
use retrace_core::pacer::{FeedbackDisposition, PacingError, PresentationPacer, RequestId};
use retrace_core::time::{Duration, HostTime};

/// How far back a stale sequence report lands.
const REGRESS_DISTANCE: u64 = 5;

// ---------------------------------------------------------------------------
// Pathology toggles
// ---------------------------------------------------------------------------

/// Runtime pathology toggles for stress scenarios.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathologyToggles {
    /// Every Nth submission is discarded instead of shown. Zero disables.
    pub drop_every: u32,
    /// After this many frames the display stops answering entirely.
    pub silence_after: Option<u64>,
    /// At the given frame the display's sequence counter jumps to the given
    /// value, as if scan-outs happened without feedback.
    pub gap_at: Option<(u64, u64)>,
    /// At the given frame the display reports a stale, lower sequence.
    pub regress_at: Option<u64>,
    /// The display stops supplying sequence numbers.
    pub strip_sequence: bool,
    /// Alternating ± nanoseconds applied to each vsync interval.
    pub jitter_ns: u64,
}

// ---------------------------------------------------------------------------
// Scripted display
// ---------------------------------------------------------------------------

/// What one [`ScriptedDisplay::step`] produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Feedback arrived and the frame was shown.
    Presented(FeedbackDisposition),
    /// Feedback arrived and the frame was discarded.
    Discarded(FeedbackDisposition),
    /// The feedback deadline passed; the request was resolved as lost.
    Lost(FeedbackDisposition),
    /// The pacer refused this step's submission.
    Rejected(PacingError),
    /// The display stayed silent and the deadline has not passed yet.
    Pending,
}

/// Tallies from [`ScriptedDisplay::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames confirmed on screen.
    pub presented: u64,
    /// Discarded feedbacks delivered by the display.
    pub discarded: u64,
    /// Requests resolved as lost by the timeout poll.
    pub lost: u64,
    /// Submissions refused while a request was in flight.
    pub rejected: u64,
    /// Silent steps where the deadline had not passed yet.
    pub pending: u64,
    /// Discards synthesized by the pacer for sequence gaps.
    pub synthesized: u64,
    /// Presented records whose sequence went backwards.
    pub regressions: u64,
}

/// Deterministic stand-in for a display server.
///
/// Each [`step`](Self::step) submits one frame to the pacer, advances the
/// simulated clock by one refresh interval, and delivers the scripted
/// feedback (or stays silent and polls the timeout in the producer's
/// stead). Discarded frames do not consume scan-out slots; only presents
/// advance the display's sequence counter.
#[derive(Debug)]
pub struct ScriptedDisplay {
    refresh: Duration,
    toggles: PathologyToggles,
    now: HostTime,
    next_sequence: u64,
    frame: u64,
}

impl ScriptedDisplay {
    /// Creates a display with the given vsync period and pathologies.
    #[must_use]
    pub fn new(refresh: Duration, toggles: PathologyToggles) -> Self {
        Self {
            refresh,
            toggles,
            now: HostTime::ZERO,
            next_sequence: 0,
            frame: 0,
        }
    }

    /// Current simulated clock reading.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.now
    }

    /// Frames submitted so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Submits one frame, advances one refresh interval, and delivers the
    /// scripted outcome.
    #[must_use]
    pub fn step(&mut self, pacer: &PresentationPacer) -> StepOutcome {
        self.frame += 1;
        let frame = self.frame;
        let refused = pacer.request_feedback(RequestId(frame), self.now).err();

        self.advance_one_interval(frame);

        if self.is_silent(frame) {
            // The display has gone dark; this poll stands in for the
            // producer's wall-clock timer.
            return match pacer.poll_timeout(self.now) {
                Some(disposition) => StepOutcome::Lost(disposition),
                None => refused.map_or(StepOutcome::Pending, StepOutcome::Rejected),
            };
        }

        let event = self.script_event(frame);
        match pacer.on_feedback(event) {
            Ok(d) if d.record.is_presented() => StepOutcome::Presented(d),
            Ok(d) => StepOutcome::Discarded(d),
            Err(e) => StepOutcome::Rejected(e),
        }
    }

    /// Runs `frames` steps and tallies the outcomes.
    pub fn run(&mut self, pacer: &PresentationPacer, frames: u64) -> RunSummary {
        let mut summary = RunSummary::default();
        for _ in 0..frames {
            match self.step(pacer) {
                StepOutcome::Presented(d) => {
                    summary.presented += 1;
                    summary.synthesized += u64::from(d.synthesized_discards);
                    summary.regressions += u64::from(d.sequence_regressed);
                }
                StepOutcome::Discarded(_) => summary.discarded += 1,
                StepOutcome::Lost(_) => summary.lost += 1,
                StepOutcome::Rejected(_) => summary.rejected += 1,
                StepOutcome::Pending => summary.pending += 1,
            }
        }
        summary
    }

    fn is_silent(&self, frame: u64) -> bool {
        self.toggles.silence_after.is_some_and(|after| frame > after)
    }

    fn advance_one_interval(&mut self, frame: u64) {
        let period = self.refresh.as_nanos();
        let jitter = self.toggles.jitter_ns.min(period / 2);
        let nanos = if jitter == 0 {
            period
        } else if frame % 2 == 0 {
            period + jitter
        } else {
            period - jitter
        };
        self.now = self.now.saturating_add(Duration::from_nanos(nanos));
    }

    fn script_event(&mut self, frame: u64) -> FeedbackEvent {
        if self.toggles.drop_every > 0 && frame % u64::from(self.toggles.drop_every) == 0 {
            return FeedbackEvent::Discarded;
        }

        self.next_sequence += 1;
        if let Some((at, to)) = self.toggles.gap_at {
            if frame == at {
                self.next_sequence = to;
            }
        }
        let mut sequence = self.next_sequence;
        if self.toggles.regress_at == Some(frame) {
            // Report a stale position; the display counter keeps marching.
            sequence = sequence.saturating_sub(REGRESS_DISTANCE).max(1);
        }

        FeedbackEvent::Presented {
            timestamp: self.now,
            sequence: (!self.toggles.strip_sequence).then_some(sequence),
            refresh: self.refresh,
            flags: PresentFlags::VSYNC,
        }
    }
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

/// Letter grade for pacing quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaceGrade {
    /// Steady intervals and a negligible discard rate.
    A,
    /// Good pacing with moderate discards.
    B,
    /// Degraded but usable.
    C,
    /// Poor pacing.
    D,
}

impl PaceGrade {
    /// Returns a short label for HUD rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`PaceTracker::report`].
#[derive(Clone, Copy, Debug)]
pub struct PaceReport {
    /// Current grade.
    pub grade: PaceGrade,
    /// Frames confirmed on screen.
    pub presented: u64,
    /// Discard records observed, including synthesized gap discards.
    pub discarded: u64,
    /// Requests resolved as lost.
    pub lost: u64,
    /// Discards per 1000 records.
    pub discard_per_1000: f64,
    /// Mean presented interval over the ring, in milliseconds.
    pub mean_interval_ms: f64,
}

/// Rolling pacing tracker with fixed-size presented-interval history.
#[derive(Debug)]
pub struct PaceTracker<const N: usize> {
    intervals_ms: [f64; N],
    cursor: usize,
    nominal_ms: f64,
    presented: u64,
    discarded: u64,
    lost: u64,
    last_presented: Option<HostTime>,
}

impl<const N: usize> Default for PaceTracker<N> {
    fn default() -> Self {
        Self::new(16.67)
    }
}

impl<const N: usize> PaceTracker<N> {
    /// Creates a tracker with `nominal_ms` prefilled in the interval ring.
    #[must_use]
    pub const fn new(nominal_ms: f64) -> Self {
        Self {
            intervals_ms: [nominal_ms; N],
            cursor: 0,
            nominal_ms,
            presented: 0,
            discarded: 0,
            lost: 0,
            last_presented: None,
        }
    }

    /// Folds one step outcome into the tracker and returns an updated
    /// report.
    ///
    /// A lost request counts as one discard as well, mirroring the discard
    /// record the pacer synthesizes for it.
    #[must_use]
    pub fn observe(&mut self, outcome: &StepOutcome) -> PaceReport {
        match outcome {
            StepOutcome::Presented(d) => {
                self.presented = self.presented.saturating_add(1);
                self.discarded = self
                    .discarded
                    .saturating_add(u64::from(d.synthesized_discards));
                if let Some(ts) = d.record.timestamp {
                    if let Some(prev) = self.last_presented {
                        let delta = ts.saturating_duration_since(prev);
                        self.intervals_ms[self.cursor % N] = delta.as_millis_f64();
                        self.cursor = (self.cursor + 1) % N;
                    }
                    self.last_presented = Some(ts);
                }
            }
            StepOutcome::Discarded(_) => {
                self.discarded = self.discarded.saturating_add(1);
            }
            StepOutcome::Lost(_) => {
                self.lost = self.lost.saturating_add(1);
                self.discarded = self.discarded.saturating_add(1);
            }
            StepOutcome::Rejected(_) | StepOutcome::Pending => {}
        }
        self.report()
    }

    /// Returns the current report without observing anything.
    #[must_use]
    pub fn report(&self) -> PaceReport {
        let total = self.presented + self.discarded;
        let discard_per_1000 = if total == 0 {
            0.0
        } else {
            self.discarded as f64 * 1000.0 / total as f64
        };
        let mean = self.intervals_ms.iter().sum::<f64>() / N as f64;
        let grade = grade_for((mean - self.nominal_ms).abs(), discard_per_1000, self.lost);
        PaceReport {
            grade,
            presented: self.presented,
            discarded: self.discarded,
            lost: self.lost,
            discard_per_1000,
            mean_interval_ms: mean,
        }
    }

    /// Returns ring-buffer intervals oldest→newest.
    #[must_use]
    pub fn intervals(&self) -> [f64; N] {
        let mut out = [0.0; N];
        let mut i = 0;
        while i < N {
            let idx = (self.cursor + i) % N;
            out[i] = self.intervals_ms[idx];
            i += 1;
        }
        out
    }

    /// Returns an ASCII sparkline over `intervals()`.
    #[must_use]
    pub fn sparkline_ascii(&self, min_ms: f64, max_ms: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(N);
        let mut i = 0;
        while i < N {
            let idx = (self.cursor + i) % N;
            let v = self.intervals_ms[idx].clamp(min_ms, max_ms);
            let t = (v - min_ms) / (max_ms - min_ms);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "level index is clamped to the ASCII ramp"
            )]
            let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
            out.push(LEVELS[level] as char);
            i += 1;
        }
        out
    }
}

fn grade_for(interval_error_ms: f64, discard_per_1000: f64, lost: u64) -> PaceGrade {
    if lost == 0 && interval_error_ms < 1.0 && discard_per_1000 < 10.0 {
        PaceGrade::A
    } else if interval_error_ms < 2.5 && discard_per_1000 < 50.0 {
        PaceGrade::B
    } else if interval_error_ms < 5.0 && discard_per_1000 < 150.0 {
        PaceGrade::C
    } else {
        PaceGrade::D
    }
}

// ---------------------------------------------------------------------------
// Overlay rendering
// ---------------------------------------------------------------------------

/// Renders the overlay statistics line.
///
/// Format: `Seq: 245 | P:245 D:0 | V:245 Z:0`, with `Seq: N/A` before the
/// first present and an optional `~59.9Hz` suffix when a refresh estimate
/// is supplied.
#[must_use]
pub fn status_line(stats: &PresentationStats, refresh_hz: Option<f64>) -> String {
    let mut line = match stats.last_sequence {
        Some(seq) => format!("Seq: {seq}"),
        None => String::from("Seq: N/A"),
    };
    let _ = write!(
        line,
        " | P:{} D:{} | V:{} Z:{}",
        stats.presented_count, stats.discarded_count, stats.vsync_count, stats.zero_copy_count,
    );
    if let Some(hz) = refresh_hz {
        let _ = write!(line, " | ~{hz:.1}Hz");
    }
    line
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::pacer::PacerConfig;
    use retrace_core::refresh::REFRESH_60HZ;

    const NOMINAL_MS: f64 = 16.666_667;

    #[test]
    fn steady_stream_grades_a() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, PathologyToggles::default());
        let mut tracker = PaceTracker::<32>::new(NOMINAL_MS);

        for _ in 0..120 {
            let _ = tracker.observe(&display.step(&pacer));
        }

        let report = tracker.report();
        assert_eq!(report.presented, 120);
        assert_eq!(report.discarded, 0);
        assert_eq!(report.lost, 0);
        assert_eq!(report.grade, PaceGrade::A);

        let stats = pacer.registry().snapshot();
        assert_eq!(stats.last_sequence, Some(120));
        assert_eq!(stats.vsync_count, 120);
        assert_eq!(pacer.refresh_estimate(), REFRESH_60HZ);
    }

    #[test]
    fn silence_cycles_through_timeouts() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            silence_after: Some(10),
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);
        let mut tracker = PaceTracker::<16>::new(NOMINAL_MS);

        for _ in 0..19 {
            let _ = tracker.observe(&display.step(&pacer));
        }

        // Ten presents, then a submit → reject → timeout cycle every three
        // intervals while the display stays dark.
        let report = tracker.report();
        assert_eq!(report.presented, 10);
        assert_eq!(report.lost, 3);
        assert_eq!(report.discarded, 3, "each timeout synthesized a discard");
        assert_eq!(report.grade, PaceGrade::D);
        assert!(pacer.is_idle(), "last timeout returned the pacer to idle");

        let stats = pacer.registry().snapshot();
        assert_eq!(stats.presented_count, 10);
        assert_eq!(stats.discarded_count, 3);
    }

    #[test]
    fn rejections_while_a_request_is_in_flight() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            silence_after: Some(1),
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);

        let summary = display.run(&pacer, 6);
        assert_eq!(summary.presented, 1);
        assert_eq!(summary.pending, 2, "first silent steps await the deadline");
        assert_eq!(summary.rejected, 2, "resubmits refused while pending");
        assert_eq!(summary.lost, 1);
    }

    #[test]
    fn dropped_frames_are_counted() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            drop_every: 4,
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);

        let summary = display.run(&pacer, 16);
        assert_eq!(summary.presented, 12);
        assert_eq!(summary.discarded, 4);
        assert_eq!(summary.synthesized, 0, "drops do not consume scan-out slots");

        let stats = pacer.registry().snapshot();
        assert_eq!(stats.last_sequence, Some(12));
        assert_eq!(status_line(&stats, None), "Seq: 12 | P:12 D:4 | V:12 Z:0");
    }

    #[test]
    fn sequence_gap_synthesizes_discards_end_to_end() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            gap_at: Some((21, 24)),
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);

        let summary = display.run(&pacer, 25);
        assert_eq!(summary.presented, 25);
        assert_eq!(summary.synthesized, 3, "sequences 21..=23 were skipped");
        assert_eq!(summary.discarded, 0);

        let stats = pacer.registry().snapshot();
        assert_eq!(stats.presented_count, 25);
        assert_eq!(stats.discarded_count, 3);
        assert_eq!(stats.last_sequence, Some(28));
    }

    #[test]
    fn regression_is_flagged_and_high_water_holds() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            regress_at: Some(15),
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);

        let summary = display.run(&pacer, 15);
        assert_eq!(summary.presented, 15);
        assert_eq!(summary.regressions, 1);
        assert_eq!(summary.synthesized, 0);

        let stats = pacer.registry().snapshot();
        assert_eq!(stats.presented_count, 15, "the stale record still counted");
        assert_eq!(stats.last_sequence, Some(14), "high-water mark held");
    }

    #[test]
    fn stripped_sequences_are_assigned_consecutively() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            strip_sequence: true,
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);

        let summary = display.run(&pacer, 5);
        assert_eq!(summary.presented, 5);
        assert_eq!(summary.synthesized, 0, "assigned sequences leave no gaps");

        let stats = pacer.registry().snapshot();
        assert_eq!(stats.last_sequence, Some(5));
        assert_eq!(status_line(&stats, None), "Seq: 5 | P:5 D:0 | V:5 Z:0");
    }

    #[test]
    fn moderate_drops_grade_b() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            drop_every: 33,
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);
        let mut tracker = PaceTracker::<32>::new(NOMINAL_MS);

        for _ in 0..100 {
            let _ = tracker.observe(&display.step(&pacer));
        }

        let report = tracker.report();
        assert_eq!(report.presented, 97);
        assert_eq!(report.discarded, 3);
        assert!((report.discard_per_1000 - 30.0).abs() < 1e-6);
        assert_eq!(report.grade, PaceGrade::B);
    }

    #[test]
    fn jitter_averages_out() {
        let pacer = PresentationPacer::new(PacerConfig::hz60());
        let toggles = PathologyToggles {
            jitter_ns: 500_000,
            ..Default::default()
        };
        let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);
        let mut tracker = PaceTracker::<32>::new(NOMINAL_MS);

        for _ in 0..64 {
            let _ = tracker.observe(&display.step(&pacer));
        }

        let report = tracker.report();
        assert_eq!(report.presented, 64, "jitter never pushed past the deadline");
        assert!((report.mean_interval_ms - NOMINAL_MS).abs() < 0.01);
        assert_eq!(report.grade, PaceGrade::A);
    }

    #[test]
    fn status_line_overlay_format() {
        let mut stats = PresentationStats::default();
        assert_eq!(status_line(&stats, None), "Seq: N/A | P:0 D:0 | V:0 Z:0");

        stats.presented_count = 245;
        stats.vsync_count = 245;
        stats.last_sequence = Some(245);
        assert_eq!(status_line(&stats, None), "Seq: 245 | P:245 D:0 | V:245 Z:0");
        assert_eq!(
            status_line(&stats, Some(59.94)),
            "Seq: 245 | P:245 D:0 | V:245 Z:0 | ~59.9Hz",
        );
    }

    #[test]
    fn sparkline_has_one_level_per_slot() {
        let tracker = PaceTracker::<16>::new(16.67);
        let line = tracker.sparkline_ascii(10.0, 40.0);
        assert_eq!(line.len(), 16);
        let first = line.chars().next().unwrap();
        assert!(line.chars().all(|c| c == first), "seeded ring is flat");
    }
}

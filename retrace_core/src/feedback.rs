// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation feedback records and cumulative statistics.
//!
//! A [`FeedbackEvent`] is what a display collaborator delivers for a submitted
//! frame: presented (with display timing) or discarded. The pacer resolves
//! each event into an immutable [`FeedbackRecord`], and the registry folds
//! records into a [`PresentationStats`] aggregate.
//!
//! Flag bit values match the presentation-time protocol wire encoding, so a
//! backend can forward compositor-reported bits without remapping.

use bitflags::bitflags;

use crate::time::{Duration, HostTime};

bitflags! {
    /// Display capabilities reported with a presented frame.
    ///
    /// Bit values are the presentation-time protocol's `kind` flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PresentFlags: u32 {
        /// Presentation was synchronized to the vertical retrace.
        const VSYNC = 0x1;
        /// The timestamp was provided by display hardware.
        const HW_CLOCK = 0x2;
        /// Completion of the presentation was signalled by hardware.
        const HW_COMPLETION = 0x4;
        /// The frame was scanned out directly, without a copy.
        const ZERO_COPY = 0x8;
    }
}

/// Whether a submitted frame reached the screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedbackOutcome {
    /// The frame was shown; display timing is known.
    Presented,
    /// The frame was never shown (replaced, occluded, timed out, or skipped).
    Discarded,
}

/// Feedback delivered by a display collaborator for one submitted frame.
///
/// `sequence` is `None` when the source cannot report a scan-out position;
/// the pacer then assigns the next position after the last presented frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackEvent {
    /// The frame reached the screen.
    Presented {
        /// When the frame was actually displayed.
        timestamp: HostTime,
        /// Display-reported scan-out counter, if the source supplies one.
        sequence: Option<u64>,
        /// Nominal refresh period reported with the event; zero when the
        /// display rate is unknown or variable.
        refresh: Duration,
        /// Capability flags for this presentation.
        flags: PresentFlags,
    },
    /// The frame was discarded without being shown.
    Discarded,
}

/// One resolved feedback outcome, immutable once created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedbackRecord {
    /// Whether the frame was presented or discarded.
    pub outcome: FeedbackOutcome,
    /// Display-confirmed scan-out position. `None` for discarded frames,
    /// which do not consume sequence numbers.
    pub sequence: Option<u64>,
    /// Actual display time. `None` for discarded frames.
    pub timestamp: Option<HostTime>,
    /// Nominal refresh period reported with the feedback; zero when unknown.
    pub refresh: Duration,
    /// Capability flags. Empty for discarded frames.
    pub flags: PresentFlags,
}

impl FeedbackRecord {
    /// Creates a record for a frame that reached the screen.
    #[must_use]
    pub const fn presented(
        sequence: u64,
        timestamp: HostTime,
        refresh: Duration,
        flags: PresentFlags,
    ) -> Self {
        Self {
            outcome: FeedbackOutcome::Presented,
            sequence: Some(sequence),
            timestamp: Some(timestamp),
            refresh,
            flags,
        }
    }

    /// Creates a record for a frame that was discarded without display.
    #[must_use]
    pub const fn discarded() -> Self {
        Self {
            outcome: FeedbackOutcome::Discarded,
            sequence: None,
            timestamp: None,
            refresh: Duration::ZERO,
            flags: PresentFlags::empty(),
        }
    }

    /// Whether this record describes a presented frame.
    #[inline]
    #[must_use]
    pub const fn is_presented(&self) -> bool {
        matches!(self.outcome, FeedbackOutcome::Presented)
    }
}

/// Cumulative presentation statistics.
///
/// Counters count records ever folded in; trimming the history ring never
/// decrements them. `last_sequence` and `last_timestamp` are high-water
/// marks: a stale feedback delivered late cannot move either backwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresentationStats {
    /// Frames confirmed on screen.
    pub presented_count: u64,
    /// Frames discarded without display (including synthesized discards).
    pub discarded_count: u64,
    /// Presented frames aligned to the vertical retrace.
    pub vsync_count: u64,
    /// Presented frames with a hardware-provided timestamp.
    pub hw_clock_count: u64,
    /// Presented frames with hardware completion signalling.
    pub hw_completion_count: u64,
    /// Presented frames scanned out without a copy.
    pub zero_copy_count: u64,
    /// Highest display sequence seen on a presented frame.
    pub last_sequence: Option<u64>,
    /// Latest display timestamp seen on a presented frame.
    pub last_timestamp: Option<HostTime>,
}

impl PresentationStats {
    /// Folds one record into the aggregate.
    pub fn apply(&mut self, record: &FeedbackRecord) {
        match record.outcome {
            FeedbackOutcome::Presented => {
                self.presented_count += 1;
                if record.flags.contains(PresentFlags::VSYNC) {
                    self.vsync_count += 1;
                }
                if record.flags.contains(PresentFlags::HW_CLOCK) {
                    self.hw_clock_count += 1;
                }
                if record.flags.contains(PresentFlags::HW_COMPLETION) {
                    self.hw_completion_count += 1;
                }
                if record.flags.contains(PresentFlags::ZERO_COPY) {
                    self.zero_copy_count += 1;
                }
                if let Some(seq) = record.sequence {
                    self.last_sequence = self.last_sequence.max(Some(seq));
                }
                if let Some(ts) = record.timestamp {
                    self.last_timestamp = self.last_timestamp.max(Some(ts));
                }
            }
            FeedbackOutcome::Discarded => {
                self.discarded_count += 1;
            }
        }
    }

    /// Total records folded in so far.
    #[inline]
    #[must_use]
    pub const fn total_records(&self) -> u64 {
        self.presented_count + self.discarded_count
    }

    /// Fraction of records that were discarded, in `0.0..=1.0`. Zero before
    /// any record.
    #[must_use]
    pub fn discard_rate(&self) -> f64 {
        let total = self.total_records();
        if total == 0 {
            return 0.0;
        }
        self.discarded_count as f64 / total as f64
    }
}

// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`FeedbackSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Every record delivered via [`on_record`](FeedbackSink::on_record) is
//! stored together with the post-update statistics, so a recording can be
//! replayed without re-running the aggregation.

use retrace_core::feedback::{
    FeedbackEvent, FeedbackOutcome, FeedbackRecord, PresentFlags, PresentationStats,
};
use retrace_core::pacer::{PendingRequest, RequestId};
use retrace_core::sink::FeedbackSink;
use retrace_core::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_RECORD: u8 = 1;
const TAG_LOST: u8 = 2;
const TAG_SPURIOUS: u8 = 3;
const TAG_REGRESSION: u8 = 4;
const TAG_GAP: u8 = 5;
const TAG_CANCEL: u8 = 6;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`FeedbackSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_option_u64(&mut self, v: Option<u64>) {
        match v {
            Some(val) => {
                self.write_u8(1);
                self.write_u64(val);
            }
            None => {
                self.write_u8(0);
                self.write_u64(0);
            }
        }
    }

    fn write_outcome(&mut self, outcome: FeedbackOutcome) {
        self.write_u8(match outcome {
            FeedbackOutcome::Presented => 0,
            FeedbackOutcome::Discarded => 1,
        });
    }

    fn write_pending(&mut self, request: &PendingRequest) {
        self.write_u64(request.id.0);
        self.write_u64(request.submitted_at.as_nanos());
        self.write_u64(request.deadline.as_nanos());
    }
}

impl FeedbackSink for RecorderSink {
    fn on_record(&mut self, record: &FeedbackRecord, stats: &PresentationStats) {
        self.write_u8(TAG_RECORD);
        self.write_outcome(record.outcome);
        self.write_option_u64(record.sequence);
        self.write_option_u64(record.timestamp.map(HostTime::as_nanos));
        self.write_u64(record.refresh.as_nanos());
        self.write_u32(record.flags.bits());
        self.write_u64(stats.presented_count);
        self.write_u64(stats.discarded_count);
        self.write_u64(stats.vsync_count);
        self.write_u64(stats.hw_clock_count);
        self.write_u64(stats.hw_completion_count);
        self.write_u64(stats.zero_copy_count);
        self.write_option_u64(stats.last_sequence);
        self.write_option_u64(stats.last_timestamp.map(HostTime::as_nanos));
    }

    fn on_lost(&mut self, request: &PendingRequest) {
        self.write_u8(TAG_LOST);
        self.write_pending(request);
    }

    fn on_spurious(&mut self, event: &FeedbackEvent) {
        self.write_u8(TAG_SPURIOUS);
        match *event {
            FeedbackEvent::Presented {
                timestamp,
                sequence,
                refresh,
                flags,
            } => {
                self.write_u8(0);
                self.write_u64(timestamp.as_nanos());
                self.write_option_u64(sequence);
                self.write_u64(refresh.as_nanos());
                self.write_u32(flags.bits());
            }
            FeedbackEvent::Discarded => {
                self.write_u8(1);
                self.write_u64(0);
                self.write_option_u64(None);
                self.write_u64(0);
                self.write_u32(0);
            }
        }
    }

    fn on_sequence_regression(&mut self, last: u64, incoming: u64) {
        self.write_u8(TAG_REGRESSION);
        self.write_u64(last);
        self.write_u64(incoming);
    }

    fn on_gap_detected(&mut self, last: u64, incoming: u64, synthesized: u32) {
        self.write_u8(TAG_GAP);
        self.write_u64(last);
        self.write_u64(incoming);
        self.write_u32(synthesized);
    }

    fn on_cancel(&mut self, request: &PendingRequest) {
        self.write_u8(TAG_CANCEL);
        self.write_pending(request);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A record accepted into the registry, with the statistics as they
    /// stood immediately after the update.
    Record {
        /// The resolved feedback outcome.
        record: FeedbackRecord,
        /// The aggregate after folding `record` in.
        stats: PresentationStats,
    },
    /// A pending request that exceeded its feedback deadline.
    Lost(PendingRequest),
    /// Feedback that arrived with no request in flight and was dropped.
    Spurious(FeedbackEvent),
    /// A presented sequence that went backwards.
    SequenceRegression {
        /// High-water mark at the time of the event.
        last: u64,
        /// The regressed sequence that arrived.
        incoming: u64,
    },
    /// A sequence jump with discards synthesized for the missing cycles.
    GapDetected {
        /// Last presented sequence before the jump.
        last: u64,
        /// The sequence that revealed the gap.
        incoming: u64,
        /// Number of discard records synthesized.
        synthesized: u32,
    },
    /// A pending request dropped during teardown without an outcome.
    Cancelled(PendingRequest),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_option_u64(&mut self) -> Option<Option<u64>> {
        let present = self.read_u8()?;
        let val = self.read_u64()?;
        Some(if present != 0 { Some(val) } else { None })
    }

    fn read_outcome(&mut self) -> Option<FeedbackOutcome> {
        Some(match self.read_u8()? {
            0 => FeedbackOutcome::Presented,
            _ => FeedbackOutcome::Discarded,
        })
    }

    fn read_pending(&mut self) -> Option<PendingRequest> {
        Some(PendingRequest {
            id: RequestId(self.read_u64()?),
            submitted_at: HostTime(self.read_u64()?),
            deadline: HostTime(self.read_u64()?),
        })
    }

    fn decode_record(&mut self) -> Option<RecordedEvent> {
        let record = FeedbackRecord {
            outcome: self.read_outcome()?,
            sequence: self.read_option_u64()?,
            timestamp: self.read_option_u64()?.map(HostTime),
            refresh: Duration(self.read_u64()?),
            flags: PresentFlags::from_bits_truncate(self.read_u32()?),
        };
        let stats = PresentationStats {
            presented_count: self.read_u64()?,
            discarded_count: self.read_u64()?,
            vsync_count: self.read_u64()?,
            hw_clock_count: self.read_u64()?,
            hw_completion_count: self.read_u64()?,
            zero_copy_count: self.read_u64()?,
            last_sequence: self.read_option_u64()?,
            last_timestamp: self.read_option_u64()?.map(HostTime),
        };
        Some(RecordedEvent::Record { record, stats })
    }

    fn decode_spurious(&mut self) -> Option<RecordedEvent> {
        let discarded = self.read_u8()? != 0;
        let timestamp = HostTime(self.read_u64()?);
        let sequence = self.read_option_u64()?;
        let refresh = Duration(self.read_u64()?);
        let flags = PresentFlags::from_bits_truncate(self.read_u32()?);
        Some(RecordedEvent::Spurious(if discarded {
            FeedbackEvent::Discarded
        } else {
            FeedbackEvent::Presented {
                timestamp,
                sequence,
                refresh,
                flags,
            }
        }))
    }

    fn decode_regression(&mut self) -> Option<RecordedEvent> {
        let last = self.read_u64()?;
        let incoming = self.read_u64()?;
        Some(RecordedEvent::SequenceRegression { last, incoming })
    }

    fn decode_gap(&mut self) -> Option<RecordedEvent> {
        let last = self.read_u64()?;
        let incoming = self.read_u64()?;
        let synthesized = self.read_u32()?;
        Some(RecordedEvent::GapDetected {
            last,
            incoming,
            synthesized,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_RECORD => self.decode_record(),
            TAG_LOST => self.read_pending().map(RecordedEvent::Lost),
            TAG_SPURIOUS => self.decode_spurious(),
            TAG_REGRESSION => self.decode_regression(),
            TAG_GAP => self.decode_gap(),
            TAG_CANCEL => self.read_pending().map(RecordedEvent::Cancelled),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

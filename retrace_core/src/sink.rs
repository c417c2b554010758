// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observer interface for pacing events.
//!
//! A [`FeedbackSink`] registered on the pacer is invoked synchronously, on
//! the thread that delivered the triggering call, immediately after the
//! registry has been updated. A sink that reads
//! [`FeedbackRegistry::snapshot`](crate::registry::FeedbackRegistry::snapshot)
//! therefore always observes statistics that already include the record it
//! was notified about. No pacer or registry lock is held during sink calls.
//!
//! All methods have default no-op implementations, so implementing only the
//! events you care about is fine.

use crate::feedback::{FeedbackEvent, FeedbackRecord, PresentationStats};
use crate::pacer::PendingRequest;

// ---------------------------------------------------------------------------
// FeedbackSink trait
// ---------------------------------------------------------------------------

/// Receives pacing and feedback events.
pub trait FeedbackSink {
    /// Called for every record accepted into the registry, including
    /// synthesized discards, with the post-update statistics.
    fn on_record(&mut self, record: &FeedbackRecord, stats: &PresentationStats) {
        _ = (record, stats);
    }

    /// Called when a pending request exceeded its feedback deadline and was
    /// resolved as discarded. The synthesized record is also delivered via
    /// [`on_record`](Self::on_record).
    fn on_lost(&mut self, request: &PendingRequest) {
        _ = request;
    }

    /// Called when feedback arrived with no request in flight. The event is
    /// dropped, not recorded.
    fn on_spurious(&mut self, event: &FeedbackEvent) {
        _ = event;
    }

    /// Called when a presented sequence went backwards. The record is still
    /// applied; the high-water mark does not move.
    fn on_sequence_regression(&mut self, last: u64, incoming: u64) {
        _ = (last, incoming);
    }

    /// Called when a sequence jump was noticed and discards were synthesized
    /// for the missing cycles.
    fn on_gap_detected(&mut self, last: u64, incoming: u64, synthesized: u32) {
        _ = (last, incoming, synthesized);
    }

    /// Called when a pending request was dropped during teardown without
    /// recording an outcome.
    fn on_cancel(&mut self, request: &PendingRequest) {
        _ = request;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`FeedbackSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl FeedbackSink for NoopSink {}

// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable feedback output.
//!
//! [`PrettyPrintSink`] implements [`FeedbackSink`] and writes one line per
//! event to a [`Write`](std::io::Write) destination (default: stderr).
//! Timestamps are printed in microseconds.

use std::io::Write;

use retrace_core::feedback::{FeedbackEvent, FeedbackRecord, PresentationStats};
use retrace_core::pacer::PendingRequest;
use retrace_core::sink::FeedbackSink;
use retrace_core::time::HostTime;

/// Writes human-readable feedback lines to a [`Write`](std::io::Write)
/// destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }
}

fn host_us(t: HostTime) -> f64 {
    t.as_nanos() as f64 / 1000.0
}

fn sequence_field(sequence: Option<u64>) -> String {
    sequence.map_or_else(|| String::from("?"), |seq| seq.to_string())
}

impl<W: Write> FeedbackSink for PrettyPrintSink<W> {
    fn on_record(&mut self, record: &FeedbackRecord, stats: &PresentationStats) {
        if record.is_presented() {
            let at = record.timestamp.map_or(0.0, host_us);
            let _ = writeln!(
                self.writer,
                "[present] seq={} at={at:.1}µs flags={:?}",
                sequence_field(record.sequence),
                record.flags,
            );
        } else {
            let _ = writeln!(
                self.writer,
                "[discard] presented={} discarded={}",
                stats.presented_count, stats.discarded_count,
            );
        }
    }

    fn on_lost(&mut self, request: &PendingRequest) {
        let _ = writeln!(
            self.writer,
            "[lost] request={} submitted={:.1}µs deadline={:.1}µs",
            request.id.0,
            host_us(request.submitted_at),
            host_us(request.deadline),
        );
    }

    fn on_spurious(&mut self, event: &FeedbackEvent) {
        match event {
            FeedbackEvent::Presented {
                timestamp,
                sequence,
                ..
            } => {
                let _ = writeln!(
                    self.writer,
                    "[spurious] seq={} at={:.1}µs",
                    sequence_field(*sequence),
                    host_us(*timestamp),
                );
            }
            FeedbackEvent::Discarded => {
                let _ = writeln!(self.writer, "[spurious] discarded");
            }
        }
    }

    fn on_sequence_regression(&mut self, last: u64, incoming: u64) {
        let _ = writeln!(self.writer, "[regress] last={last} incoming={incoming}");
    }

    fn on_gap_detected(&mut self, last: u64, incoming: u64, synthesized: u32) {
        let _ = writeln!(
            self.writer,
            "[gap] last={last} incoming={incoming} synthesized={synthesized}",
        );
    }

    fn on_cancel(&mut self, request: &PendingRequest) {
        let _ = writeln!(self.writer, "[cancel] request={}", request.id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::feedback::PresentFlags;
    use retrace_core::time::Duration;

    #[test]
    fn pretty_print_present() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        let record = FeedbackRecord::presented(
            245,
            HostTime(1_000_000),
            Duration::from_nanos(16_666_667),
            PresentFlags::VSYNC,
        );
        let mut stats = PresentationStats::default();
        stats.apply(&record);
        sink.on_record(&record, &stats);

        let output = String::from_utf8(sink.writer).unwrap();
        assert!(output.contains("[present]"), "got: {output}");
        assert!(output.contains("seq=245"), "got: {output}");
        assert!(output.contains("at=1000.0µs"), "got: {output}");
    }

    #[test]
    fn pretty_print_discard_shows_totals() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        let mut stats = PresentationStats::default();
        stats.apply(&FeedbackRecord::discarded());
        sink.on_record(&FeedbackRecord::discarded(), &stats);

        let output = String::from_utf8(sink.writer).unwrap();
        assert!(output.contains("[discard]"), "got: {output}");
        assert!(output.contains("discarded=1"), "got: {output}");
    }

    #[test]
    fn pretty_print_gap() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_gap_detected(5, 8, 2);

        let output = String::from_utf8(sink.writer).unwrap();
        assert!(output.contains("[gap] last=5 incoming=8"), "got: {output}");
    }
}

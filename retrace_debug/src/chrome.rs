// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use retrace_core::feedback::{FeedbackEvent, FeedbackOutcome};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Presented records become instant events at their display timestamp, and
/// every record also emits a counter sample tracking the presented and
/// discarded totals. Timestamps are nanoseconds converted to microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Discarded records carry no timestamp; place them at the last
    // presented time so counter samples stay ordered.
    let mut last_ts_us = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::Record { record, stats } => {
                let ts = match record.outcome {
                    FeedbackOutcome::Presented => {
                        let ts = record.timestamp.map_or(0.0, |t| nanos_to_us(t.as_nanos()));
                        last_ts_us = ts;
                        events.push(json!({
                            "ph": "i",
                            "name": "Presented",
                            "cat": "Feedback",
                            "ts": ts,
                            "pid": 0,
                            "tid": 0,
                            "s": "t",
                            "args": {
                                "sequence": record.sequence,
                                "refresh_us": nanos_to_us(record.refresh.as_nanos()),
                                "flags": format!("{:?}", record.flags),
                            }
                        }));
                        ts
                    }
                    FeedbackOutcome::Discarded => {
                        events.push(json!({
                            "ph": "i",
                            "name": "Discarded",
                            "cat": "Feedback",
                            "ts": last_ts_us,
                            "pid": 0,
                            "tid": 0,
                            "s": "t",
                            "args": {}
                        }));
                        last_ts_us
                    }
                };
                events.push(json!({
                    "ph": "C",
                    "name": "presentation",
                    "ts": ts,
                    "pid": 0,
                    "args": {
                        "presented": stats.presented_count,
                        "discarded": stats.discarded_count,
                    }
                }));
            }
            RecordedEvent::Lost(request) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FeedbackLost",
                    "cat": "Pacing",
                    "ts": nanos_to_us(request.deadline.as_nanos()),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "request": request.id.0,
                        "submitted_us": nanos_to_us(request.submitted_at.as_nanos()),
                    }
                }));
            }
            RecordedEvent::Spurious(event) => {
                let (ts, sequence) = match event {
                    FeedbackEvent::Presented {
                        timestamp,
                        sequence,
                        ..
                    } => (nanos_to_us(timestamp.as_nanos()), sequence),
                    FeedbackEvent::Discarded => (last_ts_us, None),
                };
                events.push(json!({
                    "ph": "i",
                    "name": "SpuriousFeedback",
                    "cat": "Pacing",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "sequence": sequence,
                    }
                }));
            }
            RecordedEvent::SequenceRegression { last, incoming } => {
                events.push(json!({
                    "ph": "i",
                    "name": "SequenceRegression",
                    "cat": "Pacing",
                    "ts": last_ts_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "last": last,
                        "incoming": incoming,
                    }
                }));
            }
            RecordedEvent::GapDetected {
                last,
                incoming,
                synthesized,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "SequenceGap",
                    "cat": "Pacing",
                    "ts": last_ts_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "last": last,
                        "incoming": incoming,
                        "synthesized": synthesized,
                    }
                }));
            }
            RecordedEvent::Cancelled(request) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Cancelled",
                    "cat": "Pacing",
                    "ts": nanos_to_us(request.submitted_at.as_nanos()),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "request": request.id.0,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use retrace_core::feedback::{FeedbackRecord, PresentFlags, PresentationStats};
    use retrace_core::pacer::{PendingRequest, RequestId};
    use retrace_core::sink::FeedbackSink;
    use retrace_core::time::{Duration, HostTime};

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        let record = FeedbackRecord::presented(
            245,
            HostTime(1_000_000),
            Duration::from_nanos(16_666_667),
            PresentFlags::VSYNC,
        );
        let mut stats = PresentationStats::default();
        stats.apply(&record);
        rec.on_record(&record, &stats);
        rec.on_lost(&PendingRequest {
            id: RequestId(3),
            submitted_at: HostTime(1_000_000),
            deadline: HostTime(51_000_000),
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        // First event is the presented instant, at the display timestamp.
        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "Presented");
        assert_eq!(parsed[0]["ts"], 1000.0);
        assert_eq!(parsed[0]["args"]["sequence"], 245);

        // Second is the counter sample with the running totals.
        assert_eq!(parsed[1]["ph"], "C");
        assert_eq!(parsed[1]["args"]["presented"], 1);
        assert_eq!(parsed[1]["args"]["discarded"], 0);

        // Third is the lost-feedback marker at the deadline.
        assert_eq!(parsed[2]["name"], "FeedbackLost");
        assert_eq!(parsed[2]["ts"], 51_000.0);
    }

    #[test]
    fn discarded_records_reuse_the_last_presented_timestamp() {
        let mut rec = RecorderSink::new();
        let presented = FeedbackRecord::presented(
            1,
            HostTime(2_000_000),
            Duration::ZERO,
            PresentFlags::empty(),
        );
        let mut stats = PresentationStats::default();
        stats.apply(&presented);
        rec.on_record(&presented, &stats);
        stats.apply(&FeedbackRecord::discarded());
        rec.on_record(&FeedbackRecord::discarded(), &stats);

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&String::from_utf8(out).unwrap()).unwrap();

        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[2]["name"], "Discarded");
        assert_eq!(parsed[2]["ts"], 2000.0);
        assert_eq!(parsed[3]["args"]["discarded"], 1);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}

// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated pacing loop that exercises the feedback and diagnostics
//! pipeline.
//!
//! Runs 120 synthetic frames through a
//! [`PresentationPacer`](retrace_core::pacer::PresentationPacer) via the
//! scripted display, with a dropped frame every 30th submission and one
//! sequence gap. A [`PrettyPrintSink`](retrace_debug::pretty::PrettyPrintSink)
//! narrates every event to stdout while a
//! [`RecorderSink`](retrace_debug::recorder::RecorderSink) captures the
//! stream; at the end the recording is exported as a Chrome trace JSON file.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use parking_lot::Mutex;

use retrace_core::feedback::{FeedbackEvent, FeedbackRecord, PresentationStats};
use retrace_core::pacer::{PacerConfig, PendingRequest, PresentationPacer};
use retrace_core::refresh::REFRESH_60HZ;
use retrace_core::sink::FeedbackSink;
use retrace_debug::pretty::PrettyPrintSink;
use retrace_debug::recorder::RecorderSink;
use retrace_pace_harness::{PaceTracker, PathologyToggles, ScriptedDisplay, status_line};

const FRAME_COUNT: u64 = 120;
/// 16.6ms refresh interval in milliseconds (≈60 Hz).
const NOMINAL_MS: f64 = 16.666_667;

/// Narrates events to stdout while keeping the shared binary recording.
struct TeeSink {
    pretty: PrettyPrintSink<std::io::Stdout>,
    recorder: Arc<Mutex<RecorderSink>>,
}

impl FeedbackSink for TeeSink {
    fn on_record(&mut self, record: &FeedbackRecord, stats: &PresentationStats) {
        self.pretty.on_record(record, stats);
        self.recorder.lock().on_record(record, stats);
    }

    fn on_lost(&mut self, request: &PendingRequest) {
        self.pretty.on_lost(request);
        self.recorder.lock().on_lost(request);
    }

    fn on_spurious(&mut self, event: &FeedbackEvent) {
        self.pretty.on_spurious(event);
        self.recorder.lock().on_spurious(event);
    }

    fn on_sequence_regression(&mut self, last: u64, incoming: u64) {
        self.pretty.on_sequence_regression(last, incoming);
        self.recorder.lock().on_sequence_regression(last, incoming);
    }

    fn on_gap_detected(&mut self, last: u64, incoming: u64, synthesized: u32) {
        self.pretty.on_gap_detected(last, incoming, synthesized);
        self.recorder.lock().on_gap_detected(last, incoming, synthesized);
    }

    fn on_cancel(&mut self, request: &PendingRequest) {
        self.pretty.on_cancel(request);
        self.recorder.lock().on_cancel(request);
    }
}

fn main() {
    let recording = Arc::new(Mutex::new(RecorderSink::new()));

    // -- pacer + sinks -----------------------------------------------------
    let pacer = PresentationPacer::new(PacerConfig::hz60());
    pacer.register_sink(Box::new(TeeSink {
        pretty: PrettyPrintSink::with_writer(std::io::stdout()),
        recorder: Arc::clone(&recording),
    }));

    // -- scripted display --------------------------------------------------
    let toggles = PathologyToggles {
        drop_every: 30,
        gap_at: Some((45, 48)),
        ..Default::default()
    };
    let mut display = ScriptedDisplay::new(REFRESH_60HZ, toggles);
    let mut tracker = PaceTracker::<32>::new(NOMINAL_MS);

    for _ in 0..FRAME_COUNT {
        let _ = tracker.observe(&display.step(&pacer));
    }

    // -- summary -----------------------------------------------------------
    let report = tracker.report();
    let stats = pacer.registry().snapshot();
    let hz = 1000.0 / pacer.refresh_estimate().as_millis_f64();
    println!("{}", status_line(&stats, Some(hz)));
    println!(
        "grade {} | mean {:.2}ms | discards/1000 {:.0} | lost {}",
        report.grade.as_str(),
        report.mean_interval_ms,
        report.discard_per_1000,
        report.lost,
    );
    println!("intervals [{}]", tracker.sparkline_ascii(10.0, 40.0));

    // -- export Chrome trace -----------------------------------------------
    let path = "pace_trace.json";
    let file = File::create(path).expect("failed to create pace_trace.json");
    let mut writer = BufWriter::new(file);
    retrace_debug::chrome::export(recording.lock().as_bytes(), &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path} ({FRAME_COUNT} frames)");
}

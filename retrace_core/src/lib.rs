// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation feedback tracking and vsync pacing.
//!
//! `retrace_core` answers two questions about frames handed to a display:
//! *did each one actually reach the screen, and when may the next one be
//! submitted?* A frame producer registers a feedback request before each
//! submit, a display collaborator reports what became of the frame, and the
//! crate keeps consistent statistics while enforcing a one-in-flight pacing
//! discipline.
//!
//! # Architecture
//!
//! ```text
//!   Producer ──ready?──► PresentationPacer ◄──feedback── Display collaborator
//!                              │        ▲
//!                       record │        │ poll_timeout
//!                              ▼        │
//!                     FeedbackRegistry  External timer
//!                              │
//!                              ▼
//!                 snapshot()/recent() ──► Overlay / diagnostics
//! ```
//!
//! **[`pacer`]** — [`PresentationPacer`](pacer::PresentationPacer): the
//! Idle ⇄ Pending state machine. Resolves feedback into records, assigns
//! sequences, synthesizes discards for skipped cycles and lost requests.
//!
//! **[`registry`]** — [`FeedbackRegistry`](registry::FeedbackRegistry):
//! thread-safe record history plus cumulative statistics under one lock, so
//! snapshots are never torn.
//!
//! **[`feedback`]** — Records, events, flags, and the
//! [`PresentationStats`](feedback::PresentationStats) aggregate.
//!
//! **[`refresh`]** — [`RefreshEstimator`](refresh::RefreshEstimator):
//! smoothed refresh-period estimate feeding the timeout window.
//!
//! **[`sink`]** — [`FeedbackSink`](sink::FeedbackSink) observer trait for
//! diagnostics; invoked after each registry update.
//!
//! **[`time`]** — Nanosecond [`HostTime`](time::HostTime) and
//! [`Duration`](time::Duration) on the display's monotonic clock.
//!
//! Platform translation (Wayland presentation-time, clock access) lives in
//! backend crates; this crate performs no platform calls and runs no
//! threads.

pub mod feedback;
pub mod pacer;
pub mod refresh;
pub mod registry;
pub mod sink;
pub mod time;

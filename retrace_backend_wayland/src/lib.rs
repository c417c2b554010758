// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wayland collaborator for retrace.
//!
//! Connects a [`PresentationPacer`](retrace_core::pacer::PresentationPacer)
//! to the `wp_presentation` protocol:
//!
//! - Presentation clock selection (`clock_id`) and reads
//! - `wp_presentation_feedback` creation per tracked commit
//! - Translation of `presented`/`discarded` payloads into core events
//!
//! The binding never touches buffers or commits; it observes what the
//! compositor did with commits the caller makes.

mod connection;
mod feedback;
mod time;

pub use connection::{EmbeddedStateMode, OwnedQueueMode, PacerBinding};
pub use feedback::{flags_from_kind, presented_event, sequence_from_parts};
pub use time::{Clock, now, now_for_clock, presentation_clock_from_id};

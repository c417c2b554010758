// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Translation from `wp_presentation_feedback` payloads to core events.
//!
//! The protocol splits the presentation timestamp and the scan-out counter
//! into 32-bit halves; these helpers reassemble them and map the protocol's
//! `kind` bits onto [`PresentFlags`]. All functions are pure, so the
//! translation is testable without a compositor.

use retrace_core::feedback::{FeedbackEvent, PresentFlags};
use retrace_core::time::{Duration, HostTime};
use wayland_client::WEnum;
use wayland_protocols::wp::presentation_time::client::wp_presentation_feedback::Kind;

/// Builds the core event for a `presented` feedback payload.
#[must_use]
pub fn presented_event(
    tv_sec_hi: u32,
    tv_sec_lo: u32,
    tv_nsec: u32,
    refresh: u32,
    seq_hi: u32,
    seq_lo: u32,
    flags: WEnum<Kind>,
) -> FeedbackEvent {
    FeedbackEvent::Presented {
        timestamp: HostTime::from_timespec_parts(tv_sec_hi, tv_sec_lo, tv_nsec),
        sequence: sequence_from_parts(seq_hi, seq_lo),
        refresh: Duration::from_nanos(u64::from(refresh)),
        flags: flags_from_kind(flags),
    }
}

/// Reassembles the 64-bit scan-out counter.
///
/// Compositors without a hardware counter report zero, which maps to `None`
/// so the pacer assigns a local sequence instead.
#[must_use]
pub fn sequence_from_parts(seq_hi: u32, seq_lo: u32) -> Option<u64> {
    let seq = (u64::from(seq_hi) << 32) | u64::from(seq_lo);
    if seq == 0 { None } else { Some(seq) }
}

/// Maps protocol `kind` bits onto [`PresentFlags`], bit by bit.
///
/// Unknown bits from a newer protocol revision are dropped rather than
/// forwarded.
#[must_use]
pub fn flags_from_kind(flags: WEnum<Kind>) -> PresentFlags {
    let bits = match flags {
        WEnum::Value(kind) => kind.bits(),
        WEnum::Unknown(bits) => bits,
    };
    let mut out = PresentFlags::empty();
    if bits & Kind::Vsync.bits() != 0 {
        out |= PresentFlags::VSYNC;
    }
    if bits & Kind::HwClock.bits() != 0 {
        out |= PresentFlags::HW_CLOCK;
    }
    if bits & Kind::HwCompletion.bits() != 0 {
        out |= PresentFlags::HW_COMPLETION;
    }
    if bits & Kind::ZeroCopy.bits() != 0 {
        out |= PresentFlags::ZERO_COPY;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presented_payload_reassembles() {
        let event = presented_event(
            0,
            12,
            345_678_901,
            16_666_667,
            0,
            245,
            WEnum::Value(Kind::Vsync | Kind::ZeroCopy),
        );
        assert_eq!(
            event,
            FeedbackEvent::Presented {
                timestamp: HostTime(12 * 1_000_000_000 + 345_678_901),
                sequence: Some(245),
                refresh: Duration::from_nanos(16_666_667),
                flags: PresentFlags::VSYNC | PresentFlags::ZERO_COPY,
            }
        );
    }

    #[test]
    fn high_words_contribute() {
        let event = presented_event(1, 0, 0, 0, 1, 2, WEnum::Value(Kind::empty()));
        let FeedbackEvent::Presented {
            timestamp,
            sequence,
            refresh,
            ..
        } = event
        else {
            panic!("expected a presented event");
        };
        assert_eq!(timestamp.as_nanos(), (1_u64 << 32) * 1_000_000_000);
        assert_eq!(sequence, Some((1_u64 << 32) | 2));
        assert_eq!(refresh, Duration::ZERO);
    }

    #[test]
    fn zero_sequence_means_unknown() {
        assert_eq!(sequence_from_parts(0, 0), None);
        assert_eq!(sequence_from_parts(0, 1), Some(1));
    }

    #[test]
    fn unknown_flag_bits_are_dropped() {
        let flags = flags_from_kind(WEnum::Unknown(0x19));
        assert_eq!(flags, PresentFlags::VSYNC | PresentFlags::ZERO_COPY);

        assert_eq!(flags_from_kind(WEnum::Value(Kind::empty())), PresentFlags::empty());
        assert_eq!(
            flags_from_kind(WEnum::Value(Kind::HwClock | Kind::HwCompletion)),
            PresentFlags::HW_CLOCK | PresentFlags::HW_COMPLETION,
        );
    }
}

// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-in-flight feedback pacing.
//!
//! [`PresentationPacer`] sits between a frame producer and a display
//! collaborator. The producer asks for feedback tracking before each submit;
//! the display collaborator delivers the outcome; an external timer polls for
//! requests the display never answered. At most one request is ever in
//! flight, which is what keeps a producer from running ahead of the display.
//!
//! The pacer is a two-state machine:
//!
//! ```text
//!            request_feedback
//!   Idle ──────────────────────▶ Pending
//!    ▲                             │
//!    └── on_feedback / poll_timeout / cancel_pending
//! ```
//!
//! Every resolution path folds a [`FeedbackRecord`] into the shared
//! [`FeedbackRegistry`] (except cancellation, which records nothing) and then
//! notifies the registered [`FeedbackSink`].
//!
//! # Locking
//!
//! One mutex guards the pending request and the refresh estimator; the state
//! byte is mirrored into an atomic so [`is_idle`](PresentationPacer::is_idle)
//! never takes a lock. The pending cell is the arbiter between a real
//! feedback and a concurrent timeout: whichever side takes the request
//! resolves it, the other observes Idle. Registry updates and sink dispatch
//! happen after the pacing lock is released, and the sink is checked out of
//! its slot while a callback runs, so a callback may call back into the
//! pacer (read the registry, request feedback, cancel). Notifications raised
//! while the sink is checked out are skipped; a `register_sink` or
//! `clear_sink` landing mid-callback wins over the checked-out sink.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::feedback::{FeedbackEvent, FeedbackRecord, PresentFlags};
use crate::refresh::{REFRESH_60HZ, RefreshEstimator};
use crate::registry::FeedbackRegistry;
use crate::sink::FeedbackSink;
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Identifiers and state
// ---------------------------------------------------------------------------

/// Identifies one feedback request, assigned by the frame producer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

/// Pacing state, readable without a lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacerState {
    /// No request in flight; the producer may submit.
    Idle,
    /// A submitted frame is awaiting feedback.
    Pending,
}

const STATE_IDLE: u8 = 0;
const STATE_PENDING: u8 = 1;

/// The request currently awaiting feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    /// Producer-assigned request id.
    pub id: RequestId,
    /// When the request was registered.
    pub submitted_at: HostTime,
    /// When the request counts as lost:
    /// `submitted_at + timeout_intervals × refresh estimate`.
    pub deadline: HostTime,
}

/// How one feedback (or timeout) was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedbackDisposition {
    /// The request this resolution closes.
    pub request: RequestId,
    /// The record folded into the registry.
    pub record: FeedbackRecord,
    /// Discards synthesized for skipped cycles ahead of this record.
    pub synthesized_discards: u32,
    /// Whether the presented sequence went backwards. The record was still
    /// applied; the registry's high-water mark did not move.
    pub sequence_regressed: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from [`PresentationPacer`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacingError {
    /// A feedback request is already in flight; the frame must not be
    /// submitted with tracking.
    AlreadyPending {
        /// The request currently awaiting feedback.
        pending: RequestId,
    },
    /// Feedback arrived while no request was in flight; the event was
    /// dropped.
    SpuriousFeedback,
}

impl fmt::Display for PacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPending { pending } => {
                write!(f, "feedback request #{} already in flight", pending.0)
            }
            Self::SpuriousFeedback => {
                write!(f, "presentation feedback arrived with no request in flight")
            }
        }
    }
}

impl core::error::Error for PacingError {}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for a [`PresentationPacer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacerConfig {
    /// Refresh periods a request may remain unanswered before it is resolved
    /// as lost. Zero behaves as one.
    pub timeout_intervals: u32,
    /// Refresh period assumed before any feedback has been observed.
    pub nominal_refresh: Duration,
    /// Whether a jump in presented sequences synthesizes [`Discarded`]
    /// records for the skipped cycles.
    ///
    /// [`Discarded`]: crate::feedback::FeedbackOutcome::Discarded
    pub synthesize_gap_discards: bool,
    /// Upper bound on discards synthesized per gap, so a corrupt sequence
    /// cannot flood the registry.
    pub max_gap_synthesis: u32,
    /// History ring capacity for a registry created by
    /// [`PresentationPacer::new`].
    pub history_capacity: usize,
}

impl PacerConfig {
    /// Profile for a fixed 60 Hz display.
    #[must_use]
    pub const fn hz60() -> Self {
        Self {
            timeout_intervals: 3,
            nominal_refresh: REFRESH_60HZ,
            synthesize_gap_discards: true,
            max_gap_synthesis: 64,
            history_capacity: 64,
        }
    }

    /// Profile for a fixed 120 Hz display.
    #[must_use]
    pub const fn hz120() -> Self {
        Self {
            timeout_intervals: 3,
            nominal_refresh: Duration::from_nanos(8_333_333),
            synthesize_gap_discards: true,
            max_gap_synthesis: 64,
            history_capacity: 64,
        }
    }

    /// Profile seeded with an arbitrary nominal refresh period.
    #[must_use]
    pub const fn with_refresh(nominal_refresh: Duration) -> Self {
        Self {
            timeout_intervals: 3,
            nominal_refresh,
            synthesize_gap_discards: true,
            max_gap_synthesis: 64,
            history_capacity: 64,
        }
    }
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self::hz60()
    }
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PacerInner {
    pending: Option<PendingRequest>,
    refresh: RefreshEstimator,
}

/// Sink storage. The epoch advances on every register/clear so a sink
/// checked out for a callback is never restored over a newer write.
struct SinkSlot {
    sink: Option<Box<dyn FeedbackSink + Send>>,
    epoch: u64,
}

/// Tracks at most one in-flight feedback request and resolves it into
/// registry records.
///
/// All methods take `&self`; the pacer is shared across the producer thread,
/// the display-event thread, and a timer thread behind an [`Arc`].
pub struct PresentationPacer {
    state: AtomicU8,
    inner: Mutex<PacerInner>,
    registry: Arc<FeedbackRegistry>,
    sink: Mutex<SinkSlot>,
    config: PacerConfig,
}

impl PresentationPacer {
    /// Creates a pacer with its own registry, sized per
    /// [`PacerConfig::history_capacity`].
    #[must_use]
    pub fn new(config: PacerConfig) -> Self {
        let registry = Arc::new(FeedbackRegistry::with_capacity(config.history_capacity));
        Self::with_registry(config, registry)
    }

    /// Creates a pacer recording into a shared registry.
    #[must_use]
    pub fn with_registry(config: PacerConfig, registry: Arc<FeedbackRegistry>) -> Self {
        Self {
            state: AtomicU8::new(STATE_IDLE),
            inner: Mutex::new(PacerInner {
                pending: None,
                refresh: RefreshEstimator::new(config.nominal_refresh),
            }),
            registry,
            sink: Mutex::new(SinkSlot { sink: None, epoch: 0 }),
            config,
        }
    }

    /// The registry this pacer records into.
    #[must_use]
    pub fn registry(&self) -> &Arc<FeedbackRegistry> {
        &self.registry
    }

    /// The configuration this pacer was built with.
    #[must_use]
    pub fn config(&self) -> PacerConfig {
        self.config
    }

    /// Current pacing state. Lock-free.
    #[must_use]
    pub fn state(&self) -> PacerState {
        match self.state.load(Ordering::Acquire) {
            STATE_IDLE => PacerState::Idle,
            _ => PacerState::Pending,
        }
    }

    /// Whether the producer may submit a tracked frame. Lock-free.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_IDLE
    }

    /// The request currently awaiting feedback, if any.
    #[must_use]
    pub fn pending(&self) -> Option<PendingRequest> {
        self.inner.lock().pending
    }

    /// The current refresh-period estimate.
    #[must_use]
    pub fn refresh_estimate(&self) -> Duration {
        self.inner.lock().refresh.estimate()
    }

    /// Registers the sink notified on every pacing event, replacing any
    /// previous one. May be called from inside a sink callback; the newly
    /// registered sink wins.
    pub fn register_sink(&self, sink: Box<dyn FeedbackSink + Send>) {
        let mut slot = self.sink.lock();
        slot.epoch += 1;
        slot.sink = Some(sink);
    }

    /// Removes the registered sink, if any.
    pub fn clear_sink(&self) {
        let mut slot = self.sink.lock();
        slot.epoch += 1;
        slot.sink = None;
    }

    /// Registers a feedback request for the frame about to be submitted.
    ///
    /// Transitions Idle → Pending. Exactly one of two racing calls wins; the
    /// loser gets [`PacingError::AlreadyPending`] and must submit without
    /// tracking (or skip the submit).
    pub fn request_feedback(
        &self,
        id: RequestId,
        now: HostTime,
    ) -> Result<PendingRequest, PacingError> {
        let mut inner = self.inner.lock();
        if let Some(pending) = inner.pending {
            return Err(PacingError::AlreadyPending { pending: pending.id });
        }
        // Zero intervals would make every request lost on the first poll.
        let intervals = self.config.timeout_intervals.max(1);
        let window = inner.refresh.estimate().saturating_mul(intervals);
        let request = PendingRequest {
            id,
            submitted_at: now,
            deadline: now.saturating_add(window),
        };
        inner.pending = Some(request);
        self.state.store(STATE_PENDING, Ordering::Release);
        Ok(request)
    }

    /// Resolves the in-flight request with feedback from the display.
    ///
    /// Returns [`PacingError::SpuriousFeedback`] when nothing is pending; the
    /// event is dropped and the registry is untouched. Otherwise the event is
    /// resolved into a record (assigning a sequence when the source supplied
    /// none), skipped cycles are synthesized as discards, the registry is
    /// updated, and the sink is notified before this call returns.
    pub fn on_feedback(&self, event: FeedbackEvent) -> Result<FeedbackDisposition, PacingError> {
        let request = {
            let mut inner = self.inner.lock();
            let Some(request) = inner.pending.take() else {
                drop(inner);
                self.notify(|sink| sink.on_spurious(&event));
                return Err(PacingError::SpuriousFeedback);
            };
            self.state.store(STATE_IDLE, Ordering::Release);
            if let FeedbackEvent::Presented {
                timestamp, refresh, ..
            } = event
            {
                inner.refresh.observe_reported(refresh);
                inner.refresh.observe_presented(timestamp);
            }
            request
        };

        match event {
            FeedbackEvent::Presented {
                timestamp,
                sequence,
                refresh,
                flags,
            } => Ok(self.resolve_presented(request, timestamp, sequence, refresh, flags)),
            FeedbackEvent::Discarded => {
                let record = FeedbackRecord::discarded();
                self.record_and_notify(record);
                Ok(FeedbackDisposition {
                    request: request.id,
                    record,
                    synthesized_discards: 0,
                    sequence_regressed: false,
                })
            }
        }
    }

    /// Resolves the in-flight request as lost if `now` has reached its
    /// deadline.
    ///
    /// Called periodically by an external timer; the pacer runs no threads
    /// and never sleeps. A lost request synthesizes one [`Discarded`] record
    /// and returns to Idle, so a display that silently swallows a commit
    /// cannot stall the producer forever. A timeout racing a real feedback
    /// resolves the request exactly once.
    ///
    /// [`Discarded`]: crate::feedback::FeedbackOutcome::Discarded
    pub fn poll_timeout(&self, now: HostTime) -> Option<FeedbackDisposition> {
        let request = {
            let mut inner = self.inner.lock();
            match inner.pending {
                Some(request) if now >= request.deadline => {
                    inner.pending = None;
                    self.state.store(STATE_IDLE, Ordering::Release);
                    request
                }
                _ => return None,
            }
        };
        let record = FeedbackRecord::discarded();
        self.registry.record(record);
        let stats = self.registry.snapshot();
        self.notify(|sink| {
            sink.on_lost(&request);
            sink.on_record(&record, &stats);
        });
        Some(FeedbackDisposition {
            request: request.id,
            record,
            synthesized_discards: 0,
            sequence_regressed: false,
        })
    }

    /// Drops the in-flight request without recording an outcome.
    ///
    /// For teardown, when the surface is going away and feedback will never
    /// arrive. Idempotent; calling while Idle is a no-op.
    pub fn cancel_pending(&self) {
        let request = {
            let mut inner = self.inner.lock();
            let taken = inner.pending.take();
            if taken.is_some() {
                self.state.store(STATE_IDLE, Ordering::Release);
            }
            taken
        };
        if let Some(request) = request {
            self.notify(|sink| sink.on_cancel(&request));
        }
    }

    fn resolve_presented(
        &self,
        request: PendingRequest,
        timestamp: HostTime,
        sequence: Option<u64>,
        refresh: Duration,
        flags: PresentFlags,
    ) -> FeedbackDisposition {
        let before = self.registry.snapshot();
        // A source can report the 64-bit ceiling; assignment pins there.
        let assigned = sequence.unwrap_or(match before.last_sequence {
            Some(last) => last.saturating_add(1),
            None => 1,
        });

        let mut sequence_regressed = false;
        let mut synthesized_discards = 0_u32;
        let synthesize_gaps = self.config.synthesize_gap_discards;
        match before.last_sequence {
            Some(last) if assigned < last => {
                sequence_regressed = true;
                self.notify(|sink| sink.on_sequence_regression(last, assigned));
            }
            // A gap only means skipped cycles once a baseline exists; the
            // first sequence ever seen is the baseline.
            Some(last) if assigned > last.saturating_add(1) && synthesize_gaps => {
                let gap = assigned - last - 1;
                let cap = u64::from(self.config.max_gap_synthesis);
                synthesized_discards =
                    u32::try_from(gap.min(cap)).unwrap_or(self.config.max_gap_synthesis);
                self.notify(|sink| sink.on_gap_detected(last, assigned, synthesized_discards));
                for _ in 0..synthesized_discards {
                    self.record_and_notify(FeedbackRecord::discarded());
                }
            }
            _ => {}
        }

        let record = FeedbackRecord::presented(assigned, timestamp, refresh, flags);
        self.record_and_notify(record);
        FeedbackDisposition {
            request: request.id,
            record,
            synthesized_discards,
            sequence_regressed,
        }
    }

    fn record_and_notify(&self, record: FeedbackRecord) {
        self.registry.record(record);
        let stats = self.registry.snapshot();
        self.notify(|sink| sink.on_record(&record, &stats));
    }

    fn notify(&self, f: impl FnOnce(&mut dyn FeedbackSink)) {
        let mut slot = self.sink.lock();
        let Some(mut sink) = slot.sink.take() else {
            return;
        };
        let epoch = slot.epoch;
        drop(slot);
        // The sink is checked out while its callback runs: no pacer lock is
        // held across the call, so the callback may call back into the
        // pacer. A notification raised during the checkout finds the slot
        // empty and is skipped.
        f(&mut *sink);
        let mut slot = self.sink.lock();
        // An epoch bump means register_sink/clear_sink ran mid-callback;
        // that write wins over the checked-out sink.
        if slot.epoch == epoch {
            slot.sink = Some(sink);
        }
    }
}

impl fmt::Debug for PresentationPacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationPacer")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

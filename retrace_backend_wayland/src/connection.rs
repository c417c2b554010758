// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding a pacer to a Wayland connection.
//!
//! [`PacerBinding`] owns the glue between one `wl_surface` and a
//! [`PresentationPacer`]: it allocates request ids, creates
//! `wp_presentation_feedback` objects for tracked commits, and translates
//! their events back into the pacer. Buffer management and committing remain
//! the caller's business; the binding only watches what the compositor did
//! with each commit.
//!
//! # Queue ownership wiring diagram
//!
//! ```text
//! Owned queue mode
//! ----------------
//! binding owns:
//!   EventQueue<PacerBinding> + PacerBinding
//!     -> QueueHandle<PacerBinding>
//! host/toolkit creates wl_surface on its own queue as usual
//! wp_presentation binds / feedback objects are created with
//! QueueHandle<PacerBinding>
//! binding dispatches via OwnedQueueMode::dispatch_pending() or
//! OwnedQueueMode::blocking_dispatch()
//!
//! Embedded-state mode
//! -------------------
//! host owns:
//!   EventQueue<HostState> + HostState { binding: PacerBinding, ... }
//!     -> QueueHandle<HostState>
//! wp_presentation binds / feedback objects are created with the host handle
//! host dispatches via its own EventQueue::dispatch_pending(&mut host_state)
//! and forwards events to PacerBinding::handle_presentation_event /
//! PacerBinding::handle_feedback_event from its Dispatch impls.
//! ```
//!
//! One binding manages one `wl_surface`. Using a queue handle other than the
//! selected mode's causes silent non-delivery of feedback events.
//!
//! # Submission contract
//!
//! Call [`PacerBinding::request_feedback`] immediately before the commit the
//! feedback should track. When it returns [`PacingError::AlreadyPending`],
//! the previous frame is still unresolved: commit without tracking or skip
//! the frame, and keep polling [`PresentationPacer::poll_timeout`] from a
//! timer so a silent compositor cannot park the producer forever.

use core::fmt;
use std::sync::Arc;

use retrace_core::feedback::FeedbackEvent;
use retrace_core::pacer::{PacingError, PresentationPacer, RequestId};
use retrace_core::time::HostTime;
use wayland_client::backend::{ReadEventsGuard, WaylandError};
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, DispatchError, EventQueue, QueueHandle};
use wayland_protocols::wp::presentation_time::client::wp_presentation::{self, WpPresentation};
use wayland_protocols::wp::presentation_time::client::wp_presentation_feedback::{
    self, WpPresentationFeedback,
};

use crate::feedback::presented_event;
use crate::time::{Clock, now_for_clock, presentation_clock_from_id};

/// Connects one surface's presentation feedback to a [`PresentationPacer`].
#[derive(Debug)]
pub struct PacerBinding {
    pacer: Arc<PresentationPacer>,
    clock: Clock,
    next_request: u64,
}

impl PacerBinding {
    /// Creates a binding feeding the given pacer.
    #[must_use]
    pub fn new(pacer: Arc<PresentationPacer>) -> Self {
        Self {
            pacer,
            clock: Clock::Monotonic,
            next_request: 1,
        }
    }

    /// The pacer this binding feeds.
    #[must_use]
    pub fn pacer(&self) -> &Arc<PresentationPacer> {
        &self.pacer
    }

    /// The clock presentation timestamps are expressed in. Starts as
    /// `CLOCK_MONOTONIC` and switches when the compositor announces its
    /// clock.
    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Reads the current time on the presentation clock.
    #[must_use]
    pub fn now(&self) -> HostTime {
        now_for_clock(self.clock)
    }

    /// Registers a feedback request for the next commit of `surface` and
    /// creates the protocol object that will deliver its outcome.
    ///
    /// On [`PacingError::AlreadyPending`] no protocol object is created and
    /// no request id is consumed.
    pub fn request_feedback<D>(
        &mut self,
        presentation: &WpPresentation,
        surface: &WlSurface,
        qh: &QueueHandle<D>,
    ) -> Result<RequestId, PacingError>
    where
        D: Dispatch<WpPresentationFeedback, RequestId> + 'static,
    {
        let id = RequestId(self.next_request);
        self.pacer.request_feedback(id, self.now())?;
        self.next_request += 1;
        let _feedback = presentation.feedback(surface, qh, id);
        Ok(id)
    }

    /// Handles a `wp_presentation` event. Embedded-state hosts forward
    /// events here from their own `Dispatch` impl.
    pub fn handle_presentation_event(&mut self, event: wp_presentation::Event) {
        if let wp_presentation::Event::ClockId { clk_id } = event {
            self.clock = presentation_clock_from_id(clk_id);
        }
    }

    /// Handles a `wp_presentation_feedback` event. Embedded-state hosts
    /// forward events here from their own `Dispatch` impl.
    ///
    /// Feedback for a request already resolved by timeout is spurious by
    /// then; the pacer reports it to the sink and the event is dropped here.
    pub fn handle_feedback_event(&mut self, event: wp_presentation_feedback::Event) {
        match event {
            wp_presentation_feedback::Event::Presented {
                tv_sec_hi,
                tv_sec_lo,
                tv_nsec,
                refresh,
                seq_hi,
                seq_lo,
                flags,
            } => {
                let event =
                    presented_event(tv_sec_hi, tv_sec_lo, tv_nsec, refresh, seq_hi, seq_lo, flags);
                let _ = self.pacer.on_feedback(event);
            }
            wp_presentation_feedback::Event::Discarded => {
                let _ = self.pacer.on_feedback(FeedbackEvent::Discarded);
            }
            _ => {}
        }
    }
}

impl Dispatch<WpPresentation, ()> for PacerBinding {
    fn event(
        state: &mut Self,
        _proxy: &WpPresentation,
        event: wp_presentation::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        state.handle_presentation_event(event);
    }
}

impl Dispatch<WpPresentationFeedback, RequestId> for PacerBinding {
    fn event(
        state: &mut Self,
        _proxy: &WpPresentationFeedback,
        event: wp_presentation_feedback::Event,
        _data: &RequestId,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        state.handle_feedback_event(event);
    }
}

/// Owned-queue integration mode.
///
/// Keeps queue ownership entirely inside the binding and exposes explicit
/// dispatch and queue-handle accessors.
#[derive(Debug)]
pub struct OwnedQueueMode {
    event_queue: EventQueue<PacerBinding>,
    state: PacerBinding,
}

impl OwnedQueueMode {
    /// Creates an owned-queue integration from an existing Wayland
    /// connection.
    #[must_use]
    pub fn new(connection: &Connection, pacer: Arc<PresentationPacer>) -> Self {
        Self {
            event_queue: connection.new_event_queue(),
            state: PacerBinding::new(pacer),
        }
    }

    /// Returns the queue handle that must be used when binding
    /// `wp_presentation` and creating feedback objects in this mode.
    #[must_use]
    pub fn queue_handle(&self) -> QueueHandle<PacerBinding> {
        self.event_queue.handle()
    }

    /// Dispatches already-queued events without blocking.
    ///
    /// This only runs handlers for events already read from the Wayland
    /// socket into this queue; it performs no socket I/O by itself. In a
    /// non-blocking loop, pair it with [`Self::flush`] and
    /// [`Self::prepare_read`] (or equivalent external connection I/O).
    pub fn dispatch_pending(&mut self) -> Result<usize, DispatchError> {
        self.event_queue.dispatch_pending(&mut self.state)
    }

    /// Flushes requests, blocks for new events when needed, and dispatches.
    pub fn blocking_dispatch(&mut self) -> Result<usize, DispatchError> {
        self.event_queue.blocking_dispatch(&mut self.state)
    }

    /// Flushes pending outgoing requests to the Wayland socket.
    pub fn flush(&self) -> Result<(), WaylandError> {
        self.event_queue.flush()
    }

    /// Starts a synchronized socket read for poll-based loops.
    ///
    /// If this returns [`None`], dispatch queued events before trying again.
    #[must_use]
    pub fn prepare_read(&self) -> Option<ReadEventsGuard> {
        self.event_queue.prepare_read()
    }

    /// Returns an immutable reference to the binding.
    #[must_use]
    pub fn state(&self) -> &PacerBinding {
        &self.state
    }

    /// Returns a mutable reference to the binding.
    pub fn state_mut(&mut self) -> &mut PacerBinding {
        &mut self.state
    }
}

/// Embedded-state integration mode.
///
/// Host code owns the event queue and dispatch loop (a toolkit-managed
/// connection, for instance), embeds a [`PacerBinding`] in its state, and
/// forwards presentation events from its own `Dispatch` impls to
/// [`PacerBinding::handle_presentation_event`] and
/// [`PacerBinding::handle_feedback_event`]. The wrapper stores the host
/// queue handle that protocol objects must be created with.
pub struct EmbeddedStateMode<HostState> {
    queue_handle: QueueHandle<HostState>,
}

// Derives would bound `HostState`; the handle clones regardless.
impl<HostState> Clone for EmbeddedStateMode<HostState> {
    fn clone(&self) -> Self {
        Self {
            queue_handle: self.queue_handle.clone(),
        }
    }
}

impl<HostState> fmt::Debug for EmbeddedStateMode<HostState> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedStateMode").finish_non_exhaustive()
    }
}

impl<HostState> EmbeddedStateMode<HostState> {
    /// Creates an embedded-state integration wrapper from a host-owned
    /// queue handle.
    #[must_use]
    pub fn new(queue_handle: QueueHandle<HostState>) -> Self {
        Self { queue_handle }
    }

    /// Returns the queue handle that must be used when binding
    /// `wp_presentation` and creating feedback objects in this mode.
    #[must_use]
    pub fn queue_handle(&self) -> QueueHandle<HostState> {
        self.queue_handle.clone()
    }
}

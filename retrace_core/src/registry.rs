// Copyright 2026 the Retrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread-safe store of feedback records and cumulative statistics.
//!
//! [`FeedbackRegistry`] is the leaf of the tracker: the pacer (or any
//! collaborator) folds [`FeedbackRecord`]s in with [`record`], and readers
//! take [`snapshot`]s or inspect [`recent`] history from any thread.
//!
//! A single mutex guards both the aggregate and the history ring, so a
//! record append and its counter updates are one critical section and a
//! snapshot can never observe half of an update. Critical sections contain
//! no callbacks and no allocation beyond the ring's steady state, so no
//! caller blocks for longer than a few loads and stores.
//!
//! [`record`]: FeedbackRegistry::record
//! [`snapshot`]: FeedbackRegistry::snapshot
//! [`recent`]: FeedbackRegistry::recent

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::feedback::{FeedbackRecord, PresentationStats};

/// Shared store of presentation feedback.
///
/// History is a bounded ring with a drop-oldest policy; evicting an old
/// record never changes the counters, which describe everything ever
/// recorded.
#[derive(Debug)]
pub struct FeedbackRegistry {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    stats: PresentationStats,
    history: VecDeque<FeedbackRecord>,
    capacity: usize,
    evicted_count: u64,
}

impl FeedbackRegistry {
    /// Default history ring capacity.
    pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

    /// Creates a registry retaining [`DEFAULT_HISTORY_CAPACITY`] records.
    ///
    /// [`DEFAULT_HISTORY_CAPACITY`]: Self::DEFAULT_HISTORY_CAPACITY
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_HISTORY_CAPACITY)
    }

    /// Creates a registry retaining up to `capacity` records of history.
    ///
    /// A capacity of zero is promoted to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                stats: PresentationStats::default(),
                history: VecDeque::with_capacity(capacity),
                capacity,
                evicted_count: 0,
            }),
        }
    }

    /// Records one feedback outcome.
    ///
    /// Appends to the history ring (dropping the oldest record when full)
    /// and folds the record into the statistics in the same critical
    /// section. Never fails; safe to call from any thread.
    pub fn record(&self, record: FeedbackRecord) {
        let mut inner = self.inner.lock();
        if inner.history.len() == inner.capacity {
            let _ = inner.history.pop_front();
            inner.evicted_count += 1;
        }
        inner.history.push_back(record);
        inner.stats.apply(&record);
    }

    /// Returns a copy of the cumulative statistics.
    ///
    /// The copy is taken under the registry lock, so all fields describe the
    /// same instant; a concurrent [`record`](Self::record) is observed
    /// either fully or not at all.
    #[must_use]
    pub fn snapshot(&self) -> PresentationStats {
        self.inner.lock().stats
    }

    /// Returns up to `n` of the most recent records, newest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<FeedbackRecord> {
        let inner = self.inner.lock();
        inner.history.iter().rev().take(n).copied().collect()
    }

    /// Records currently retained in history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().history.len()
    }

    /// Whether the history ring is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().history.is_empty()
    }

    /// Records evicted from the ring so far. Counters in the snapshot are
    /// unaffected by eviction.
    #[must_use]
    pub fn evicted_count(&self) -> u64 {
        self.inner.lock().evicted_count
    }
}

impl Default for FeedbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::feedback::PresentFlags;
    use crate::time::{Duration, HostTime};

    fn presented(seq: u64) -> FeedbackRecord {
        FeedbackRecord::presented(
            seq,
            HostTime(seq * 16_666_667),
            Duration::from_nanos(16_666_667),
            PresentFlags::VSYNC,
        )
    }

    #[test]
    fn counters_survive_history_eviction() {
        let registry = FeedbackRegistry::with_capacity(4);
        for seq in 1..=10 {
            registry.record(presented(seq));
        }

        assert_eq!(registry.len(), 4, "ring holds only the newest records");
        assert_eq!(registry.evicted_count(), 6);

        let stats = registry.snapshot();
        assert_eq!(stats.presented_count, 10, "eviction never decrements");
        assert_eq!(stats.vsync_count, 10);
        assert_eq!(stats.last_sequence, Some(10));
    }

    #[test]
    fn zero_capacity_is_promoted_to_one() {
        let registry = FeedbackRegistry::with_capacity(0);
        registry.record(presented(1));
        registry.record(presented(2));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.recent(8)[0].sequence, Some(2));
        assert_eq!(registry.snapshot().presented_count, 2);
    }

    #[test]
    fn recent_is_newest_first_and_clamped() {
        let registry = FeedbackRegistry::new();
        for seq in 1..=5 {
            registry.record(presented(seq));
        }

        let recent = registry.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].sequence, Some(5));
        assert_eq!(recent[2].sequence, Some(3));

        assert_eq!(registry.recent(100).len(), 5, "clamps to available");
    }

    #[test]
    fn stale_sequence_does_not_lower_high_water_mark() {
        let registry = FeedbackRegistry::new();
        registry.record(presented(5));
        registry.record(presented(3));

        let stats = registry.snapshot();
        assert_eq!(stats.presented_count, 2);
        assert_eq!(stats.last_sequence, Some(5));
    }

    #[test]
    fn snapshots_are_never_torn_under_concurrent_recording() {
        // Every record carries VSYNC, so any internally-consistent snapshot
        // has vsync_count == presented_count. A torn read would break that.
        let registry = FeedbackRegistry::with_capacity(16);
        let writers = 2_u64;
        let per_writer = 1_000_u64;

        thread::scope(|scope| {
            for w in 0..writers {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..per_writer {
                        registry.record(presented(w * per_writer + i + 1));
                    }
                });
            }

            scope.spawn(|| {
                loop {
                    let stats = registry.snapshot();
                    assert_eq!(
                        stats.vsync_count, stats.presented_count,
                        "snapshot must be internally consistent"
                    );
                    if stats.presented_count == writers * per_writer {
                        break;
                    }
                    thread::yield_now();
                }
            });
        });

        assert_eq!(registry.snapshot().presented_count, writers * per_writer);
    }
}

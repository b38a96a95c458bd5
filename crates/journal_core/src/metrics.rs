//! Journal metrics.
//!
//! Counters for appends, flushes and segment churn. All counters are
//! atomic and can be read while the writer is active.
//!
//! # Usage
//!
//! ```rust,ignore
//! let journal = SegmentedJournal::open(path, JournalConfig::default())?;
//! journal.append(ASQN_IGNORE, b"data")?;
//!
//! let snapshot = journal.metrics().snapshot();
//! println!("Appends: {}", snapshot.appends);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Journal metrics.
#[derive(Debug, Default)]
pub struct JournalMetrics {
    /// Records appended.
    appends: AtomicU64,
    /// Frame bytes appended, headers included.
    appended_bytes: AtomicU64,
    /// Flushes that synced at least one segment.
    flushes: AtomicU64,
    /// Segment files created.
    segments_created: AtomicU64,
    /// Segment files deleted.
    segments_deleted: AtomicU64,
    /// `delete_after` and `reset` calls that removed content.
    truncations: AtomicU64,
}

impl JournalMetrics {
    /// Creates a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, frame_bytes: u64) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        self.appended_bytes.fetch_add(frame_bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_created(&self) {
        self.segments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segments_deleted(&self, count: u64) {
        self.segments_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_truncation(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            appends: self.appends.load(Ordering::Relaxed),
            appended_bytes: self.appended_bytes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            segments_created: self.segments_created.load(Ordering::Relaxed),
            segments_deleted: self.segments_deleted.load(Ordering::Relaxed),
            truncations: self.truncations.load(Ordering::Relaxed),
        }
    }
}

/// Immutable copy of [`JournalMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Records appended.
    pub appends: u64,
    /// Frame bytes appended.
    pub appended_bytes: u64,
    /// Flushes that synced at least one segment.
    pub flushes: u64,
    /// Segment files created.
    pub segments_created: u64,
    /// Segment files deleted.
    pub segments_deleted: u64,
    /// Truncations and resets.
    pub truncations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = JournalMetrics::new();
        metrics.record_append(40);
        metrics.record_append(60);
        metrics.record_flush();
        metrics.record_segment_created();
        metrics.record_segments_deleted(3);
        metrics.record_truncation();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.appends, 2);
        assert_eq!(snapshot.appended_bytes, 100);
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.segments_created, 1);
        assert_eq!(snapshot.segments_deleted, 3);
        assert_eq!(snapshot.truncations, 1);
    }

    #[test]
    fn new_metrics_are_zero() {
        assert_eq!(JournalMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}

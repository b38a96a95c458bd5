//! The single writer of a journal.

use crate::error::{JournalError, JournalResult};
use crate::journal::flusher::SegmentsFlusher;
use crate::manager::{SegmentsManager, SharedSegments};
use crate::metrics::JournalMetrics;
use crate::record::{compute_checksum, serialize, JournalRecord, RecordHeader};
use crate::segment::FRAME_HEADER_SIZE;
use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

/// Appends, truncates and resets a journal.
///
/// There is exactly one writer per journal. Callers serialize access to it;
/// the writer takes the manager's write lock only for the duration of each
/// call so readers can proceed in between.
#[derive(Debug)]
pub struct SegmentedJournalWriter {
    segments: SharedSegments,
    flusher: SegmentsFlusher,
    metrics: Arc<JournalMetrics>,
}

impl SegmentedJournalWriter {
    /// Creates a writer over `segments`.
    #[must_use]
    pub fn new(
        segments: SharedSegments,
        flusher: SegmentsFlusher,
        metrics: Arc<JournalMetrics>,
    ) -> Self {
        Self {
            segments,
            flusher,
            metrics,
        }
    }

    /// Returns the index the next append gets.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.segments.read().next_index()
    }

    /// Returns the flusher.
    #[must_use]
    pub fn flusher(&self) -> &SegmentsFlusher {
        &self.flusher
    }

    /// Appends `data` at the next index.
    ///
    /// # Errors
    ///
    /// Returns `EntryTooLarge`, `OutOfDiskSpace`, `JournalClosed` or an I/O
    /// error. Nothing is appended on error.
    pub fn append(&mut self, asqn: i64, data: &[u8]) -> JournalResult<JournalRecord> {
        let mut segments = self.segments.write();
        segments.ensure_open()?;

        let index = segments.next_index();
        let serialized = serialize(index, asqn, data);
        let checksum = compute_checksum(&serialized);
        self.write(&mut segments, index, checksum, serialized)
    }

    /// Appends a record serialized by another journal, byte for byte.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChecksum` if `checksum` does not match `serialized`,
    /// `InvalidIndex` if the embedded index is not the next index,
    /// `InvalidRecord` if the bytes are too short to be a record, and the
    /// errors of [`append`](Self::append).
    pub fn append_serialized(
        &mut self,
        checksum: u32,
        serialized: &[u8],
    ) -> JournalResult<JournalRecord> {
        let actual = compute_checksum(serialized);
        if actual != checksum {
            return Err(JournalError::InvalidChecksum {
                expected: checksum,
                actual,
            });
        }

        let header = RecordHeader::decode(serialized)?;
        let mut segments = self.segments.write();
        segments.ensure_open()?;

        let expected = segments.next_index();
        if header.index != expected {
            return Err(JournalError::InvalidIndex {
                expected,
                actual: header.index,
            });
        }
        self.write(&mut segments, expected, checksum, serialized.to_vec())
    }

    fn write(
        &self,
        segments: &mut SegmentsManager,
        index: u64,
        checksum: u32,
        serialized: Vec<u8>,
    ) -> JournalResult<JournalRecord> {
        let frame_len = (FRAME_HEADER_SIZE + serialized.len()) as u64;
        segments
            .current_segment(frame_len)?
            .append(index, checksum, &serialized)?;
        self.metrics.record_append(frame_len);

        JournalRecord::from_serialized(checksum, Bytes::from(serialized))
    }

    /// Removes every entry after `index`.
    ///
    /// The flushed watermark is lowered to `index` first, so a crash in
    /// between never leaves it above the last entry. Below the retained
    /// range this is a [`reset`](Self::reset) to `index + 1`.
    ///
    /// # Errors
    ///
    /// Returns `JournalClosed` or an I/O error.
    pub fn delete_after(&mut self, index: u64) -> JournalResult<()> {
        let mut segments = self.segments.write();
        segments.ensure_open()?;

        if index >= segments.last_index() {
            return Ok(());
        }
        if index < segments.first_index() {
            return Self::reset_locked(&mut segments, &mut self.flusher, index + 1);
        }

        if self.flusher.next_flush_index() > index + 1 {
            self.flusher.set_last_flushed_index(index)?;
        }
        segments.delete_after(index)
    }

    /// Removes segments whose entries all lie below `index`.
    ///
    /// Returns the number of segments deleted.
    ///
    /// # Errors
    ///
    /// Returns `JournalClosed` or an I/O error.
    pub fn delete_until(&mut self, index: u64) -> JournalResult<usize> {
        self.segments.write().delete_until(index)
    }

    /// Deletes all entries; the next append gets `next_index`.
    ///
    /// Clears the persisted flushed index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `next_index` is 0, `JournalClosed`, or
    /// an I/O error.
    pub fn reset(&mut self, next_index: u64) -> JournalResult<()> {
        let mut segments = self.segments.write();
        Self::reset_locked(&mut segments, &mut self.flusher, next_index)
    }

    fn reset_locked(
        segments: &mut SegmentsManager,
        flusher: &mut SegmentsFlusher,
        next_index: u64,
    ) -> JournalResult<()> {
        segments.ensure_open()?;
        if next_index == 0 {
            return Err(JournalError::invalid_operation("journal indices start at 1"));
        }

        flusher.reset(next_index)?;
        if let Err(err) = segments.reset(next_index) {
            if segments.first_index() != next_index {
                warn!(next_index, error = %err, "journal reset failed, keeping existing entries");
                flusher.reset(segments.first_index())?;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Makes every written entry durable.
    ///
    /// # Errors
    ///
    /// Returns `JournalClosed` or an I/O error.
    pub fn flush(&mut self) -> JournalResult<()> {
        let mut segments = self.segments.write();
        self.flusher.flush(&mut segments)
    }
}

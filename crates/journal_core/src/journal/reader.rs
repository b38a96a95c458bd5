//! Sequential readers.

use crate::error::{JournalError, JournalResult};
use crate::manager::{SegmentsManager, SharedSegments};
use crate::record::JournalRecord;
use std::sync::Arc;

/// Position of the next frame to read.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    /// First index of the segment the position belongs to.
    segment: u64,
    position: u64,
}

/// Reads journal entries in index order.
///
/// A reader is independent of the writer: it takes the manager's read lock
/// for each entry and verifies every frame it returns. When entries are
/// removed underneath it, the reader moves back into the retained range on
/// its next call.
///
/// [`has_next`](Self::has_next) reads and verifies the entry ahead; the
/// verified record is kept for the following `next`.
///
/// Iteration ends at the last written entry; entries appended later are
/// returned by later calls.
#[derive(Debug)]
pub struct SegmentedJournalReader {
    segments: SharedSegments,
    generation: u64,
    next_index: u64,
    cursor: Option<Cursor>,
    peeked: Option<(JournalRecord, Cursor)>,
}

impl SegmentedJournalReader {
    /// Creates a reader positioned at the first entry.
    #[must_use]
    pub fn new(segments: SharedSegments) -> Self {
        let (generation, next_index) = {
            let manager = segments.read();
            (manager.generation(), manager.first_index())
        };
        Self {
            segments,
            generation,
            next_index,
            cursor: None,
            peeked: None,
        }
    }

    /// Returns the index the next call to `next` reads.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Returns true if a valid, checksum-verified entry is stored at the
    /// reader's position.
    ///
    /// Returns false at the end of the journal, after close, and when the
    /// frame at the position is damaged; `next` reports the error then.
    pub fn has_next(&mut self) -> bool {
        let segments = Arc::clone(&self.segments);
        let manager = segments.read();
        if manager.is_closed() {
            return false;
        }
        self.sync_generation(&manager);
        if self.peeked.is_some() {
            return true;
        }

        match self.read_current(&manager) {
            Ok(Some(peeked)) => {
                self.peeked = Some(peeked);
                true
            }
            Ok(None) | Err(_) => false,
        }
    }

    /// Positions the reader so the next call to `next` returns `index`.
    ///
    /// Indices outside the retained range are clamped to it: below the
    /// first entry the reader starts at the first entry, beyond the last it
    /// waits at the next index to be written. Returns the resulting position.
    pub fn seek(&mut self, index: u64) -> u64 {
        let segments = Arc::clone(&self.segments);
        let manager = segments.read();
        self.generation = manager.generation();
        self.cursor = None;
        self.peeked = None;
        self.next_index = clamp(index, &manager);
        self.next_index
    }

    /// Positions the reader at the first entry.
    pub fn seek_to_first(&mut self) -> u64 {
        let first = self.segments.read().first_index();
        self.seek(first)
    }

    /// Positions the reader at the last entry, or at the next index to be
    /// written if the journal is empty.
    pub fn seek_to_last(&mut self) -> u64 {
        let last = self.segments.read().last_index();
        self.seek(last)
    }

    fn sync_generation(&mut self, manager: &SegmentsManager) {
        if manager.generation() != self.generation {
            self.generation = manager.generation();
            self.cursor = None;
            self.peeked = None;
            self.next_index = clamp(self.next_index, manager);
        }
    }

    fn read_next(&mut self) -> JournalResult<Option<JournalRecord>> {
        let segments = Arc::clone(&self.segments);
        let manager = segments.read();
        manager.ensure_open()?;
        self.sync_generation(&manager);

        let peeked = match self.peeked.take() {
            Some(peeked) => Some(peeked),
            None => self.read_current(&manager)?,
        };
        Ok(peeked.map(|(record, cursor)| {
            self.cursor = Some(cursor);
            self.next_index += 1;
            record
        }))
    }

    /// Reads the entry at `next_index` without moving the reader.
    fn read_current(
        &self,
        manager: &SegmentsManager,
    ) -> JournalResult<Option<(JournalRecord, Cursor)>> {
        let index = self.next_index;
        if index > manager.last_index() {
            return Ok(None);
        }

        let cached = self.cursor.and_then(|cursor| {
            manager
                .segment_for_index(index)
                .filter(|segment| segment.first_index() == cursor.segment)
                .map(|segment| (segment, cursor.position))
        });
        let (segment, position) = match cached {
            Some(found) => found,
            None => {
                let segment = manager.segment_for_index(index).ok_or_else(|| {
                    JournalError::corrupted(format!("no segment holds index {index}"))
                })?;
                let position = segment.position_of(index)?.ok_or_else(|| {
                    JournalError::corrupted(format!(
                        "index {index} missing from segment {}",
                        segment.id()
                    ))
                })?;
                (segment, position)
            }
        };

        let (record, next_position) = segment.read_at(position, index)?;
        let cursor = Cursor {
            segment: segment.first_index(),
            position: next_position,
        };
        Ok(Some((record, cursor)))
    }
}

fn clamp(index: u64, manager: &SegmentsManager) -> u64 {
    index.max(manager.first_index()).min(manager.next_index())
}

impl Iterator for SegmentedJournalReader {
    type Item = JournalResult<JournalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

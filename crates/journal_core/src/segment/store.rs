//! A single segment file.

use crate::error::{JournalError, JournalResult};
use crate::record::{compute_checksum, JournalRecord, RECORD_HEADER_SIZE};
use crate::segment::descriptor::{SegmentDescriptor, DESCRIPTOR_SIZE};
use crate::segment::frame::{encode_with_invalidation, Frame, FRAME_HEADER_SIZE};
use crate::segment::index::SparseIndex;
use bytes::Bytes;
use journal_storage::StorageBackend;

/// First frame position in every segment.
const FIRST_POSITION: u64 = DESCRIPTOR_SIZE as u64;

/// Outcome of looking at the frame slot at some position.
enum Probe {
    /// No frame: an empty slot or the end of the arena.
    End,
    /// A complete, verified frame.
    Entry {
        record: JournalRecord,
        next_position: u64,
    },
    /// Bytes that are not a valid frame for the expected index.
    Invalid(JournalError),
}

/// The first invalid frame found while scanning a segment on open.
#[derive(Debug)]
pub struct TornTail {
    /// Index the invalid frame should have held.
    pub index: u64,
    /// Position of the invalid frame.
    pub position: u64,
    /// Why the frame was rejected.
    pub cause: JournalError,
}

/// One file-backed, size-bounded range of the journal.
///
/// The segment owns its storage backend and an in-memory sparse index of
/// frame positions. Appends write the frame and zero the header slot after
/// it in a single write.
pub struct Segment {
    descriptor: SegmentDescriptor,
    backend: Box<dyn StorageBackend>,
    index: SparseIndex,
    /// Last index written, `first_index - 1` when empty.
    last_index: u64,
    /// Position where the next frame will be written.
    position: u64,
    preallocated: bool,
}

impl Segment {
    /// Initializes a new segment in `backend`.
    ///
    /// Writes the descriptor, optionally extends the file to its full
    /// capacity, and invalidates the first frame slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor cannot hold a frame or I/O fails.
    pub fn create(
        mut backend: Box<dyn StorageBackend>,
        descriptor: SegmentDescriptor,
        preallocate: bool,
        index_density: u64,
    ) -> JournalResult<Self> {
        if descriptor.first_index == 0 {
            return Err(JournalError::invalid_operation("journal indices start at 1"));
        }
        if u64::from(descriptor.max_segment_size) < FIRST_POSITION + FRAME_HEADER_SIZE as u64 {
            return Err(JournalError::invalid_format(format!(
                "segment size {} cannot hold any frame",
                descriptor.max_segment_size
            )));
        }

        backend.write_at(0, &descriptor.encode())?;
        if preallocate {
            let capacity = u64::from(descriptor.max_segment_size);
            if backend.size()? < capacity {
                backend.preallocate(capacity)?;
            }
        }

        let mut segment = Self::empty(backend, descriptor, preallocate, index_density);
        segment.invalidate_at(FIRST_POSITION)?;
        segment.backend.sync()?;
        Ok(segment)
    }

    /// Loads an existing segment and rebuilds its index by scanning frames.
    ///
    /// Scanning stops at the first empty slot. The first slot that holds
    /// something other than a valid frame for the next index is returned as
    /// a [`TornTail`]; the caller decides whether it is a tolerable torn
    /// write or fatal corruption.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the descriptor is unreadable, or an I/O
    /// error.
    pub fn open(
        backend: Box<dyn StorageBackend>,
        preallocate: bool,
        index_density: u64,
    ) -> JournalResult<(Self, Option<TornTail>)> {
        let size = backend.size()?;
        if size < FIRST_POSITION {
            return Err(JournalError::invalid_format(format!(
                "segment file of {size} bytes has no descriptor"
            )));
        }

        let descriptor = SegmentDescriptor::decode(&backend.read_at(0, DESCRIPTOR_SIZE)?)?;
        if descriptor.first_index == 0 {
            return Err(JournalError::invalid_format(format!(
                "segment {} starts at index 0",
                descriptor.id
            )));
        }

        let mut segment = Self::empty(backend, descriptor, preallocate, index_density);
        let torn = segment.scan()?;
        Ok((segment, torn))
    }

    /// Opens an existing segment, treating any invalid frame as corruption.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedJournal` if any frame is invalid, or the errors of
    /// the underlying open.
    pub fn open_strict(
        backend: Box<dyn StorageBackend>,
        preallocate: bool,
        index_density: u64,
    ) -> JournalResult<Self> {
        let (segment, torn) = Self::open(backend, preallocate, index_density)?;
        match torn {
            None => Ok(segment),
            Some(torn) => Err(JournalError::corrupted(format!(
                "segment {} has an invalid frame for index {} at position {}: {}",
                segment.id(),
                torn.index,
                torn.position,
                torn.cause
            ))),
        }
    }

    fn empty(
        backend: Box<dyn StorageBackend>,
        descriptor: SegmentDescriptor,
        preallocated: bool,
        index_density: u64,
    ) -> Self {
        Self {
            last_index: descriptor.first_index - 1,
            descriptor,
            backend,
            index: SparseIndex::new(index_density),
            position: FIRST_POSITION,
            preallocated,
        }
    }

    fn scan(&mut self) -> JournalResult<Option<TornTail>> {
        loop {
            let expected = self.last_index + 1;
            match self.probe(self.position, expected)? {
                Probe::End => return Ok(None),
                Probe::Entry { next_position, .. } => {
                    self.index.record(expected, self.position);
                    self.last_index = expected;
                    self.position = next_position;
                }
                Probe::Invalid(cause) => {
                    return Ok(Some(TornTail {
                        index: expected,
                        position: self.position,
                        cause,
                    }));
                }
            }
        }
    }

    /// Returns the segment descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Returns the segment ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.descriptor.id
    }

    /// Returns the first index this segment can hold.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.descriptor.first_index
    }

    /// Returns the last index written, `first_index() - 1` when empty.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    /// Returns true if no entry has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_index < self.descriptor.first_index
    }

    /// Returns the number of entries in the segment.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.last_index + 1 - self.descriptor.first_index
    }

    /// Returns true if `index` lies within the written range.
    #[must_use]
    pub fn contains(&self, index: u64) -> bool {
        index >= self.descriptor.first_index && index <= self.last_index
    }

    /// Returns the number of bytes in use, descriptor included.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.position
    }

    /// Returns the maximum size of the segment file.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        u64::from(self.descriptor.max_segment_size)
    }

    /// Returns the position of the first frame.
    #[must_use]
    pub fn first_position(&self) -> u64 {
        FIRST_POSITION
    }

    /// Returns true if a frame of `frame_len` bytes no longer fits.
    #[must_use]
    pub fn is_full(&self, frame_len: u64) -> bool {
        self.position + frame_len > self.capacity()
    }

    /// Returns the largest frame an empty segment with this capacity holds.
    #[must_use]
    pub fn max_frame_len(capacity: u64) -> u64 {
        capacity.saturating_sub(FIRST_POSITION)
    }

    /// Appends a serialized record as the next entry.
    ///
    /// Returns the position the frame was written at.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` if `index` does not follow the last index,
    /// `InvalidOperation` if the frame does not fit, or an I/O error.
    pub fn append(&mut self, index: u64, checksum: u32, serialized: &[u8]) -> JournalResult<u64> {
        let expected = self.last_index + 1;
        if index != expected {
            return Err(JournalError::InvalidIndex {
                expected,
                actual: index,
            });
        }

        let length = u32::try_from(serialized.len())
            .map_err(|_| JournalError::invalid_record("serialized record too large"))?;
        let frame = Frame { length, checksum };
        if self.is_full(frame.frame_len()) {
            return Err(JournalError::invalid_operation(format!(
                "segment {} is full: {} + {} bytes exceeds {}",
                self.id(),
                self.position,
                frame.frame_len(),
                self.capacity()
            )));
        }

        let room = self.capacity() - self.position;
        let bytes = encode_with_invalidation(frame, serialized, room);
        let position = self.position;
        self.backend.write_at(position, &bytes)?;

        self.index.record(index, position);
        self.last_index = index;
        self.position = position + frame.frame_len();
        Ok(position)
    }

    /// Reads and verifies the frame at `position`, which must hold `index`.
    ///
    /// Returns the record and the position of the following frame.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` if the stored checksum does not match and
    /// `CorruptedJournal` if the slot is empty or holds another index.
    pub fn read_at(&self, position: u64, index: u64) -> JournalResult<(JournalRecord, u64)> {
        match self.probe(position, index)? {
            Probe::Entry {
                record,
                next_position,
            } => Ok((record, next_position)),
            Probe::Invalid(err) => Err(err),
            Probe::End => Err(JournalError::corrupted(format!(
                "expected index {index} at position {position} of segment {}, found no entry",
                self.id()
            ))),
        }
    }

    /// Returns the position of the frame holding `index`.
    ///
    /// Returns `None` if the index is not in this segment.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame header on the way cannot be read.
    pub fn position_of(&self, index: u64) -> JournalResult<Option<u64>> {
        if !self.contains(index) {
            return Ok(None);
        }

        let (mut current, mut position) = self
            .index
            .lookup(index)
            .unwrap_or((self.first_index(), FIRST_POSITION));
        while current < index {
            position += self.frame_len_at(position)?;
            current += 1;
        }
        Ok(Some(position))
    }

    fn frame_len_at(&self, position: u64) -> JournalResult<u64> {
        let header = self.read_header(position)?;
        Frame::decode_header(&header)
            .map(|frame| frame.frame_len())
            .ok_or_else(|| {
                JournalError::corrupted(format!(
                    "missing frame at position {position} of segment {}",
                    self.id()
                ))
            })
    }

    fn read_header(&self, position: u64) -> JournalResult<[u8; FRAME_HEADER_SIZE]> {
        let bytes = self.backend.read_at(position, FRAME_HEADER_SIZE)?;
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&bytes);
        Ok(header)
    }

    fn probe(&self, position: u64, expected: u64) -> JournalResult<Probe> {
        let limit = self.capacity().min(self.backend.size()?);
        if position + FRAME_HEADER_SIZE as u64 > limit {
            return Ok(Probe::End);
        }

        let Some(frame) = Frame::decode_header(&self.read_header(position)?) else {
            return Ok(Probe::End);
        };

        if (frame.length as usize) < RECORD_HEADER_SIZE {
            return Ok(Probe::Invalid(JournalError::corrupted(format!(
                "frame at position {position} has invalid length {}",
                frame.length
            ))));
        }
        let next_position = position + frame.frame_len();
        if next_position > limit {
            return Ok(Probe::Invalid(JournalError::corrupted(format!(
                "frame at position {position} extends to {next_position}, beyond {limit}"
            ))));
        }

        let serialized = self
            .backend
            .read_at(position + FRAME_HEADER_SIZE as u64, frame.length as usize)?;
        let actual = compute_checksum(&serialized);
        if actual != frame.checksum {
            return Ok(Probe::Invalid(JournalError::ChecksumMismatch {
                index: expected,
                expected: frame.checksum,
                actual,
            }));
        }

        let record = JournalRecord::from_serialized(frame.checksum, Bytes::from(serialized))?;
        if record.index() != expected {
            return Ok(Probe::Invalid(JournalError::corrupted(format!(
                "frame at position {position} holds index {}, expected {expected}",
                record.index()
            ))));
        }

        Ok(Probe::Entry {
            record,
            next_position,
        })
    }

    /// Removes every entry above `index`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `index` is below `first_index() - 1`,
    /// or an I/O error.
    pub fn delete_after(&mut self, index: u64) -> JournalResult<()> {
        if index >= self.last_index {
            return Ok(());
        }
        if index + 1 < self.first_index() {
            return Err(JournalError::invalid_operation(format!(
                "cannot truncate segment {} starting at {} after index {index}",
                self.id(),
                self.first_index()
            )));
        }

        let position = self.position_of(index + 1)?.ok_or_else(|| {
            JournalError::corrupted(format!("index {} missing from segment {}", index + 1, self.id()))
        })?;
        self.truncate_to(position, index)
    }

    /// Truncates the segment so that it ends at the frame boundary `offset`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `offset` is not a frame boundary within
    /// the written range, or an I/O error.
    pub fn truncate(&mut self, offset: u64) -> JournalResult<()> {
        if offset >= self.position {
            if offset == self.position {
                return self.truncate_to(offset, self.last_index);
            }
            return Err(JournalError::invalid_operation(format!(
                "offset {offset} is past the end of segment {}",
                self.id()
            )));
        }

        let (mut index, mut position) = self
            .index
            .floor_by_position(offset)
            .unwrap_or((self.first_index(), FIRST_POSITION));
        while position < offset {
            position += self.frame_len_at(position)?;
            index += 1;
        }
        if position != offset {
            return Err(JournalError::invalid_operation(format!(
                "offset {offset} is not a frame boundary in segment {}",
                self.id()
            )));
        }

        self.truncate_to(offset, index - 1)
    }

    fn truncate_to(&mut self, position: u64, last_index: u64) -> JournalResult<()> {
        if self.preallocated {
            self.invalidate_at(position)?;
        } else if self.backend.size()? > position {
            self.backend.truncate(position)?;
        }

        self.index.delete_after(last_index);
        self.last_index = last_index;
        self.position = position;
        Ok(())
    }

    /// Zeroes the frame header slot at `position` if it fits in the arena.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn invalidate_at(&mut self, position: u64) -> JournalResult<()> {
        if position + FRAME_HEADER_SIZE as u64 <= self.capacity() {
            self.backend.write_at(position, &[0u8; FRAME_HEADER_SIZE])?;
        }
        Ok(())
    }

    /// Makes every write to this segment durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn flush(&mut self) -> JournalResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("descriptor", &self.descriptor)
            .field("last_index", &self.last_index)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

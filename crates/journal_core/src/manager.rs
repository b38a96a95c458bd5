//! Segment lifecycle: loading, rolling, truncating and deleting segments.
//!
//! The manager owns every segment file handle of a journal. It is shared
//! between the writer and readers as [`SharedSegments`]; the writer takes
//! the write lock for mutations, readers take the read lock per entry.
//!
//! ## Recovery
//!
//! On open every segment is scanned. A frame that fails validation is a
//! torn write when it lies in the last segment or above the last flushed
//! index: the segment is truncated there and any later segments are
//! deleted. Anywhere else it is unrecoverable corruption.

use crate::config::JournalConfig;
use crate::dir::JournalDir;
use crate::error::{JournalError, JournalResult};
use crate::meta::MetaStore;
use crate::metrics::JournalMetrics;
use crate::segment::{Segment, SegmentDescriptor, TornTail};
use journal_storage::FileBackend;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Segments manager shared by a writer and its readers.
pub type SharedSegments = Arc<RwLock<SegmentsManager>>;

/// Owns the ordered set of segments of one journal.
///
/// There is always at least one segment while the manager is open; the
/// last one is the only one appended to.
#[derive(Debug)]
pub struct SegmentsManager {
    dir: JournalDir,
    config: JournalConfig,
    /// Segments keyed by first index.
    segments: BTreeMap<u64, Segment>,
    /// Bumped whenever entries are removed.
    generation: u64,
    closed: bool,
    metrics: Arc<JournalMetrics>,
}

impl SegmentsManager {
    /// Loads the segments in `dir`, recovering from a torn tail.
    ///
    /// Creates the first segment at index 1 if the directory holds none.
    /// `config` must already have passed [`JournalConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns `CorruptedJournal` if segment files are missing, indices have
    /// gaps, a frame below the last flushed index is damaged, or the last
    /// flushed index lies beyond the recovered entries. Returns
    /// `InvalidFormat` for unreadable descriptors.
    pub fn open(
        dir: JournalDir,
        config: JournalConfig,
        meta: &dyn MetaStore,
        metrics: Arc<JournalMetrics>,
    ) -> JournalResult<Self> {
        dir.remove_temp_files()?;

        let mut manager = Self {
            dir,
            config,
            segments: BTreeMap::new(),
            generation: 0,
            closed: false,
            metrics,
        };

        let flushed = meta.load_last_flushed_index();
        manager.load_segments(flushed)?;

        if manager.segments.is_empty() {
            manager.create_segment(1, 1)?;
        }

        let last_index = manager.last_index();
        if let Some(flushed) = flushed {
            if flushed > last_index {
                error!(flushed, last_index, "journal lost flushed entries");
                return Err(JournalError::corrupted(format!(
                    "last flushed index {flushed} is beyond the last entry {last_index}"
                )));
            }
        }

        debug!(
            path = %manager.dir.path().display(),
            segments = manager.segments.len(),
            first_index = manager.first_index(),
            last_index,
            "opened journal segments"
        );
        Ok(manager)
    }

    fn load_segments(&mut self, flushed: Option<u64>) -> JournalResult<()> {
        let mut files = self.dir.list_segment_files()?.into_iter();
        let mut previous: Option<(u64, u64)> = None;

        while let Some((id, path)) = files.next() {
            let (mut segment, torn) = self.load_segment(&path)?;

            if segment.id() != id {
                return Err(JournalError::corrupted(format!(
                    "segment file {} holds segment {}",
                    path.display(),
                    segment.id()
                )));
            }
            let flushed_torn = torn
                .as_ref()
                .filter(|torn| flushed.is_some_and(|flushed| torn.index <= flushed));
            if let Some(torn) = flushed_torn {
                error!(
                    segment = id,
                    index = torn.index,
                    position = torn.position,
                    cause = %torn.cause,
                    "corrupted flushed journal entry"
                );
                return Err(JournalError::corrupted(format!(
                    "segment {id} has an invalid frame for flushed index {}: {}",
                    torn.index, torn.cause
                )));
            }
            if let Some((previous_id, previous_last)) = previous {
                if id != previous_id + 1 {
                    return Err(JournalError::corrupted(format!(
                        "missing segment between {previous_id} and {id}"
                    )));
                }
                if segment.first_index() != previous_last + 1 {
                    if !files.as_slice().is_empty() {
                        return Err(JournalError::corrupted(format!(
                            "segment {id} starts at index {}, expected {}",
                            segment.first_index(),
                            previous_last + 1
                        )));
                    }
                    // A reset created this segment but did not get to delete the older ones
                    info!(
                        segment = id,
                        first_index = segment.first_index(),
                        "completing interrupted journal reset"
                    );
                    let earlier = std::mem::take(&mut self.segments);
                    let ids: Vec<u64> = earlier.values().map(Segment::id).collect();
                    drop(earlier);
                    self.delete_segment_files(ids.into_iter())?;
                }
            }
            previous = Some((id, segment.last_index()));

            let Some(torn) = torn else {
                self.segments.insert(segment.first_index(), segment);
                continue;
            };

            info!(
                segment = id,
                index = torn.index,
                position = torn.position,
                cause = %torn.cause,
                "truncating torn journal tail"
            );
            segment.truncate(torn.position)?;
            segment.flush()?;
            self.segments.insert(segment.first_index(), segment);

            let later: Vec<u64> = files.by_ref().map(|(id, _)| id).collect();
            for later_id in later.into_iter().rev() {
                info!(segment = later_id, "deleting segment after torn tail");
                self.dir.delete_segment_file(later_id)?;
                self.metrics.record_segments_deleted(1);
            }
            self.dir.sync_directory()?;
        }

        Ok(())
    }

    fn load_segment(&self, path: &Path) -> JournalResult<(Segment, Option<TornTail>)> {
        let backend = FileBackend::open_existing(path)?;
        Segment::open(
            Box::new(backend),
            self.config.preallocate_segment_files,
            self.config.index_density,
        )
    }

    /// Creates segment `id` starting at `first_index` and makes it the last
    /// segment.
    ///
    /// The file is fully initialized under a temporary name and renamed
    /// into place.
    fn create_segment(&mut self, id: u64, first_index: u64) -> JournalResult<()> {
        self.check_disk_space()?;

        let temp_path = self.dir.segment_temp_path(id);
        if temp_path.exists() {
            fs::remove_file(&temp_path)?;
        }

        let descriptor = SegmentDescriptor::new(id, first_index, self.config.max_segment_size);
        let backend = FileBackend::create_new(&temp_path)?;
        drop(Segment::create(
            Box::new(backend),
            descriptor,
            self.config.preallocate_segment_files,
            self.config.index_density,
        )?);

        let path = self.dir.segment_path(id);
        fs::rename(&temp_path, &path)?;
        self.dir.sync_directory()?;

        let segment = Segment::open_strict(
            Box::new(FileBackend::open_existing(&path)?),
            self.config.preallocate_segment_files,
            self.config.index_density,
        )?;
        self.segments.insert(first_index, segment);
        self.metrics.record_segment_created();

        info!(segment = id, first_index, "created journal segment");
        Ok(())
    }

    fn check_disk_space(&self) -> JournalResult<()> {
        if self.config.min_free_disk_space == 0 {
            return Ok(());
        }

        let mut required = self.config.min_free_disk_space;
        if self.config.preallocate_segment_files {
            required = required.saturating_add(u64::from(self.config.max_segment_size));
        }

        let available = fs2::available_space(self.dir.path())?;
        if available < required {
            return Err(JournalError::OutOfDiskSpace {
                available,
                required,
            });
        }
        Ok(())
    }

    /// Fails with `JournalClosed` once the manager is closed.
    ///
    /// # Errors
    ///
    /// Returns `JournalClosed` if [`close`](Self::close) was called.
    pub fn ensure_open(&self) -> JournalResult<()> {
        if self.closed {
            return Err(JournalError::JournalClosed);
        }
        Ok(())
    }

    /// Returns true once the manager is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the journal directory.
    #[must_use]
    pub fn dir(&self) -> &JournalDir {
        &self.dir
    }

    /// Returns the configuration the manager was opened with.
    #[must_use]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Returns the first index retained by the journal.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.segments
            .values()
            .next()
            .map_or(1, Segment::first_index)
    }

    /// Returns the last index written, `first_index() - 1` when empty.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.segments
            .values()
            .next_back()
            .map_or(0, Segment::last_index)
    }

    /// Returns the index the next append gets.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.last_index() + 1
    }

    /// Returns true if the journal holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_index() < self.first_index()
    }

    /// Returns the reader invalidation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the segments in index order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// Returns the segment new entries are appended to, rolling a new one
    /// if a frame of `frame_len` bytes does not fit.
    ///
    /// # Errors
    ///
    /// Returns `EntryTooLarge` if the frame does not fit an empty segment,
    /// `OutOfDiskSpace` if a new segment cannot be allocated, or
    /// `JournalClosed`.
    pub fn current_segment(&mut self, frame_len: u64) -> JournalResult<&mut Segment> {
        self.ensure_open()?;

        let max = Segment::max_frame_len(u64::from(self.config.max_segment_size));
        if frame_len > max {
            return Err(JournalError::EntryTooLarge {
                size: frame_len,
                max,
            });
        }

        let roll = match self.segments.values().next_back() {
            Some(segment) if segment.is_full(frame_len) => {
                Some((segment.id() + 1, segment.last_index() + 1))
            }
            Some(_) => None,
            None => return Err(JournalError::JournalClosed),
        };
        if let Some((id, first_index)) = roll {
            self.create_segment(id, first_index)?;
        }

        self.segments
            .values_mut()
            .next_back()
            .ok_or(JournalError::JournalClosed)
    }

    /// Returns the segment holding `index`, or `None` outside the retained
    /// range.
    #[must_use]
    pub fn segment_for_index(&self, index: u64) -> Option<&Segment> {
        self.segments
            .range(..=index)
            .next_back()
            .map(|(_, segment)| segment)
            .filter(|segment| segment.contains(index))
    }

    /// Returns the segments holding `from_index` and everything after it.
    pub fn tail_segments_mut(&mut self, from_index: u64) -> impl Iterator<Item = &mut Segment> {
        let start = self
            .segments
            .range(..=from_index)
            .next_back()
            .map_or(0, |(first_index, _)| *first_index);
        self.segments.range_mut(start..).map(|(_, segment)| segment)
    }

    /// Removes every entry after `index`.
    ///
    /// Segments starting after `index` are deleted eagerly. If `index` lies
    /// below the retained range the journal is reset to `index + 1`.
    ///
    /// # Errors
    ///
    /// Returns `JournalClosed` or an I/O error.
    pub fn delete_after(&mut self, index: u64) -> JournalResult<()> {
        self.ensure_open()?;
        if index >= self.last_index() {
            return Ok(());
        }
        if index < self.first_index() {
            return self.reset(index + 1);
        }

        self.remove_segments_starting_after(index)?;
        if let Some(segment) = self.segments.values_mut().next_back() {
            segment.delete_after(index)?;
            segment.flush()?;
        }

        self.generation += 1;
        self.metrics.record_truncation();
        debug!(index, "truncated journal");
        Ok(())
    }

    /// Deletes, newest first, every segment whose first index is above `index`.
    ///
    /// Entries above `index` in the segment holding it are kept; use
    /// [`delete_after`](Self::delete_after) to remove those too.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if this would remove the first segment,
    /// `JournalClosed`, or an I/O error.
    pub fn remove_segments_starting_after(&mut self, index: u64) -> JournalResult<()> {
        self.ensure_open()?;
        if index < self.first_index() {
            return Err(JournalError::invalid_operation(format!(
                "cannot remove every segment: index {index} is below the first index {}",
                self.first_index()
            )));
        }

        let removed = self.segments.split_off(&(index + 1));
        if removed.is_empty() {
            return Ok(());
        }

        let ids: Vec<u64> = removed.values().map(Segment::id).collect();
        drop(removed);
        self.generation += 1;
        self.delete_segment_files(ids.into_iter().rev())
    }

    fn delete_segment_files(&mut self, ids: impl Iterator<Item = u64>) -> JournalResult<()> {
        let mut deleted = 0;
        for id in ids {
            if self.dir.delete_segment_file(id)? {
                info!(segment = id, "deleted journal segment");
                deleted += 1;
            }
        }
        self.metrics.record_segments_deleted(deleted);
        self.dir.sync_directory()
    }

    /// Deletes every segment whose entries all lie below `index`.
    ///
    /// The last segment is never deleted. Returns the number of segments
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `JournalClosed` or an I/O error.
    pub fn delete_until(&mut self, index: u64) -> JournalResult<usize> {
        self.ensure_open()?;

        let mut ids = Vec::new();
        while self.segments.len() > 1 {
            let Some(entry) = self.segments.first_entry() else {
                break;
            };
            if entry.get().last_index() >= index {
                break;
            }
            ids.push(entry.remove().id());
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let count = ids.len();
        self.delete_segment_files(ids.into_iter())?;
        self.generation += 1;
        debug!(index, segments = count, first_index = self.first_index(), "compacted journal");
        Ok(count)
    }

    /// Deletes all entries; the next append gets `next_index`.
    ///
    /// The new segment is created before the old files are deleted, oldest
    /// first. If creation fails the journal keeps its entries. A crash during
    /// the deletions is completed on the next open.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `next_index` is 0, `JournalClosed`, or
    /// an I/O error.
    pub fn reset(&mut self, next_index: u64) -> JournalResult<()> {
        self.ensure_open()?;
        if next_index == 0 {
            return Err(JournalError::invalid_operation("journal indices start at 1"));
        }

        let next_id = self
            .segments
            .values()
            .next_back()
            .map_or(1, |segment| segment.id() + 1);
        let previous = std::mem::take(&mut self.segments);
        if let Err(err) = self.create_segment(next_id, next_index) {
            self.segments = previous;
            return Err(err);
        }

        let ids: Vec<u64> = previous.values().map(Segment::id).collect();
        drop(previous);
        self.generation += 1;
        self.metrics.record_truncation();
        self.delete_segment_files(ids.into_iter())?;
        debug!(next_index, "reset journal");
        Ok(())
    }

    /// Closes all segments and releases the directory lock.
    ///
    /// Calling it again has no effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be released.
    pub fn close(&mut self) -> JournalResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.segments.clear();
        self.generation += 1;
        self.dir.unlock()?;
        debug!(path = %self.dir.path().display(), "closed journal segments");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::InMemoryMetaStore;
    use crate::record::{compute_checksum, serialize, ASQN_IGNORE};
    use crate::segment::FRAME_HEADER_SIZE;
    use tempfile::{tempdir, TempDir};

    fn config() -> JournalConfig {
        // Descriptor + three frames of 8 + 16 + 8 bytes
        JournalConfig::new().max_segment_size(64 + 3 * 32).index_density(2)
    }

    fn open(temp: &TempDir, meta: &dyn MetaStore) -> JournalResult<SegmentsManager> {
        let dir = JournalDir::open(temp.path(), "journal", true)?;
        SegmentsManager::open(dir, config(), meta, Arc::new(JournalMetrics::new()))
    }

    fn append(manager: &mut SegmentsManager, data: &[u8; 8]) -> u64 {
        let index = manager.next_index();
        let serialized = serialize(index, ASQN_IGNORE, data);
        let frame_len = (FRAME_HEADER_SIZE + serialized.len()) as u64;
        let segment = manager.current_segment(frame_len).unwrap();
        segment
            .append(index, compute_checksum(&serialized), &serialized)
            .unwrap();
        index
    }

    fn segment_ids(manager: &SegmentsManager) -> Vec<u64> {
        manager.segments().map(Segment::id).collect()
    }

    #[test]
    fn open_creates_first_segment() {
        let temp = tempdir().unwrap();
        let manager = open(&temp, &InMemoryMetaStore::new()).unwrap();

        assert_eq!(segment_ids(&manager), vec![1]);
        assert_eq!(manager.first_index(), 1);
        assert_eq!(manager.last_index(), 0);
        assert!(manager.is_empty());
        assert!(temp.path().join("journal-1.log").exists());
    }

    #[test]
    fn rolls_segments_when_full() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();

        for _ in 0..7 {
            append(&mut manager, b"abcdefgh");
        }

        assert_eq!(segment_ids(&manager), vec![1, 2, 3]);
        assert_eq!(manager.segment_for_index(3).map(Segment::id), Some(1));
        assert_eq!(manager.segment_for_index(4).map(Segment::id), Some(2));
        assert_eq!(manager.segment_for_index(7).map(Segment::id), Some(3));
        assert!(manager.segment_for_index(8).is_none());
        assert!(manager.segment_for_index(0).is_none());
    }

    #[test]
    fn remove_segments_starting_after_keeps_holding_segment() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        for _ in 0..7 {
            append(&mut manager, b"abcdefgh");
        }

        manager.remove_segments_starting_after(5).unwrap();

        assert_eq!(segment_ids(&manager), vec![1, 2]);
        assert_eq!(manager.last_index(), 6);
        assert!(!temp.path().join("journal-3.log").exists());
        assert!(matches!(
            manager.remove_segments_starting_after(0),
            Err(JournalError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn rejects_entry_larger_than_segment() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();

        let result = manager.current_segment(1000);
        assert!(matches!(result, Err(JournalError::EntryTooLarge { size: 1000, .. })));
    }

    #[test]
    fn reopen_restores_entries() {
        let temp = tempdir().unwrap();
        {
            let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
            for _ in 0..5 {
                append(&mut manager, b"abcdefgh");
            }
        }

        let manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        assert_eq!(segment_ids(&manager), vec![1, 2]);
        assert_eq!(manager.last_index(), 5);
    }

    #[test]
    fn delete_after_removes_later_segments() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        for _ in 0..8 {
            append(&mut manager, b"abcdefgh");
        }
        let generation = manager.generation();

        manager.delete_after(2).unwrap();
        assert_eq!(segment_ids(&manager), vec![1]);
        assert_eq!(manager.last_index(), 2);
        assert!(manager.generation() > generation);
        assert!(!temp.path().join("journal-2.log").exists());
        assert!(!temp.path().join("journal-3.log").exists());

        assert_eq!(append(&mut manager, b"ABCDEFGH"), 3);
    }

    #[test]
    fn delete_after_segment_boundary() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        for _ in 0..5 {
            append(&mut manager, b"abcdefgh");
        }

        manager.delete_after(3).unwrap();
        assert_eq!(segment_ids(&manager), vec![1]);
        assert_eq!(manager.last_index(), 3);

        // The next append rolls a fresh segment 2
        assert_eq!(append(&mut manager, b"abcdefgh"), 4);
        assert_eq!(segment_ids(&manager), vec![1, 2]);
    }

    #[test]
    fn delete_until_keeps_last_segment() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        for _ in 0..7 {
            append(&mut manager, b"abcdefgh");
        }

        assert_eq!(manager.delete_until(3).unwrap(), 0);
        assert_eq!(manager.delete_until(4).unwrap(), 1);
        assert_eq!(manager.first_index(), 4);

        assert_eq!(manager.delete_until(100).unwrap(), 1);
        assert_eq!(segment_ids(&manager), vec![3]);
        assert_eq!(manager.first_index(), 7);
        assert_eq!(manager.last_index(), 7);
        drop(manager);

        let reopened = open(&temp, &InMemoryMetaStore::new()).unwrap();
        assert_eq!(segment_ids(&reopened), vec![3]);
        assert_eq!(reopened.first_index(), 7);
    }

    #[test]
    fn reset_starts_new_segment() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        for _ in 0..4 {
            append(&mut manager, b"abcdefgh");
        }

        manager.reset(100).unwrap();
        assert_eq!(segment_ids(&manager), vec![3]);
        assert_eq!(manager.first_index(), 100);
        assert!(manager.is_empty());
        assert_eq!(append(&mut manager, b"abcdefgh"), 100);

        assert!(manager.reset(0).is_err());
    }

    #[test]
    fn failed_reset_keeps_entries() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        for _ in 0..4 {
            append(&mut manager, b"abcdefgh");
        }
        let blocker = temp.path().join("journal-3.log.tmp");
        fs::create_dir(&blocker).unwrap();

        assert!(manager.reset(50).is_err());
        assert_eq!(segment_ids(&manager), vec![1, 2]);
        assert_eq!(manager.first_index(), 1);
        assert_eq!(manager.last_index(), 4);
        assert!(temp.path().join("journal-1.log").exists());
        assert_eq!(append(&mut manager, b"abcdefgh"), 5);

        fs::remove_dir(&blocker).unwrap();
        manager.reset(50).unwrap();
        assert_eq!(segment_ids(&manager), vec![3]);
        assert_eq!(append(&mut manager, b"abcdefgh"), 50);
    }

    #[test]
    fn open_completes_interrupted_reset() {
        let temp = tempdir().unwrap();
        {
            let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
            for _ in 0..4 {
                append(&mut manager, b"abcdefgh");
            }
            // The new segment exists but only the oldest file was deleted
            manager.create_segment(3, 50).unwrap();
        }
        fs::remove_file(temp.path().join("journal-1.log")).unwrap();

        let manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        assert_eq!(segment_ids(&manager), vec![3]);
        assert_eq!(manager.first_index(), 50);
        assert!(manager.is_empty());
        assert!(!temp.path().join("journal-2.log").exists());
    }

    #[test]
    fn delete_after_below_first_index_resets() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        manager.reset(10).unwrap();
        append(&mut manager, b"abcdefgh");

        manager.delete_after(4).unwrap();
        assert!(manager.is_empty());
        assert_eq!(manager.next_index(), 5);
    }

    #[test]
    fn detects_missing_segment() {
        let temp = tempdir().unwrap();
        {
            let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
            for _ in 0..7 {
                append(&mut manager, b"abcdefgh");
            }
        }
        fs::remove_file(temp.path().join("journal-2.log")).unwrap();

        let result = open(&temp, &InMemoryMetaStore::new());
        assert!(matches!(result, Err(JournalError::CorruptedJournal { .. })));
    }

    #[test]
    fn flushed_index_beyond_entries_is_fatal() {
        let temp = tempdir().unwrap();
        drop(open(&temp, &InMemoryMetaStore::new()).unwrap());

        let meta = InMemoryMetaStore::new();
        meta.store_last_flushed_index(3).unwrap();
        let result = open(&temp, &meta);
        assert!(matches!(result, Err(JournalError::CorruptedJournal { .. })));
    }

    #[test]
    fn tail_segments_from_index() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();
        for _ in 0..7 {
            append(&mut manager, b"abcdefgh");
        }

        let ids: Vec<u64> = manager.tail_segments_mut(5).map(|s| s.id()).collect();
        assert_eq!(ids, vec![2, 3]);
        let ids: Vec<u64> = manager.tail_segments_mut(0).map(|s| s.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn close_is_idempotent() {
        let temp = tempdir().unwrap();
        let mut manager = open(&temp, &InMemoryMetaStore::new()).unwrap();

        manager.close().unwrap();
        manager.close().unwrap();
        assert!(matches!(manager.current_segment(32), Err(JournalError::JournalClosed)));
        assert!(matches!(manager.delete_after(0), Err(JournalError::JournalClosed)));

        // Lock released
        assert!(open(&temp, &InMemoryMetaStore::new()).is_ok());
    }

    #[test]
    fn disk_space_guard() {
        let temp = tempdir().unwrap();
        let dir = JournalDir::open(temp.path(), "journal", true).unwrap();
        let config = config().min_free_disk_space(u64::MAX / 2);

        let result = SegmentsManager::open(
            dir,
            config,
            &InMemoryMetaStore::new(),
            Arc::new(JournalMetrics::new()),
        );
        assert!(matches!(result, Err(JournalError::OutOfDiskSpace { .. })));
    }
}

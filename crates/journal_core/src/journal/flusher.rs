//! Durable watermark tracking.

use crate::error::JournalResult;
use crate::manager::SegmentsManager;
use crate::meta::MetaStore;
use crate::metrics::JournalMetrics;
use std::sync::Arc;
use tracing::debug;

/// Makes written entries durable and records how far that goes.
///
/// The flusher remembers the first index not yet known to be on disk. A
/// flush syncs every segment from that index on, then persists the last
/// written index through the [`MetaStore`].
pub struct SegmentsFlusher {
    meta: Arc<dyn MetaStore>,
    next_flush_index: u64,
    metrics: Arc<JournalMetrics>,
}

impl SegmentsFlusher {
    /// Creates a flusher resuming from the index stored in `meta`.
    ///
    /// Without a stored index, everything from index 1 is unflushed.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaStore>, metrics: Arc<JournalMetrics>) -> Self {
        let next_flush_index = meta.load_last_flushed_index().map_or(1, |index| index + 1);
        Self {
            meta,
            next_flush_index,
            metrics,
        }
    }

    /// Returns the first index that a flush has not yet covered.
    #[must_use]
    pub fn next_flush_index(&self) -> u64 {
        self.next_flush_index
    }

    /// Returns the persisted last flushed index.
    #[must_use]
    pub fn last_flushed_index(&self) -> Option<u64> {
        self.meta.load_last_flushed_index()
    }

    /// Syncs all unflushed segments and persists the last written index.
    ///
    /// Does nothing when every written entry is already flushed.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be synced or the meta store
    /// cannot be updated. The watermark is unchanged in that case.
    pub fn flush(&mut self, segments: &mut SegmentsManager) -> JournalResult<()> {
        segments.ensure_open()?;

        let last_index = segments.last_index();
        if segments.is_empty() || last_index < self.next_flush_index {
            return Ok(());
        }

        for segment in segments.tail_segments_mut(self.next_flush_index) {
            segment.flush()?;
        }
        self.meta.store_last_flushed_index(last_index)?;
        self.next_flush_index = last_index + 1;
        self.metrics.record_flush();

        debug!(last_flushed_index = last_index, "flushed journal");
        Ok(())
    }

    /// Lowers the watermark to `index` after the entries above it were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the meta store cannot be updated.
    pub fn set_last_flushed_index(&mut self, index: u64) -> JournalResult<()> {
        self.meta.store_last_flushed_index(index)?;
        self.next_flush_index = index + 1;
        Ok(())
    }

    /// Forgets the persisted watermark; the next flush starts at `next_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the meta store cannot be updated.
    pub fn reset(&mut self, next_index: u64) -> JournalResult<()> {
        self.meta.reset_last_flushed_index()?;
        self.next_flush_index = next_index;
        Ok(())
    }
}

impl std::fmt::Debug for SegmentsFlusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentsFlusher")
            .field("next_flush_index", &self.next_flush_index)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JournalConfig;
    use crate::dir::JournalDir;
    use crate::meta::InMemoryMetaStore;
    use crate::record::{compute_checksum, serialize, ASQN_IGNORE};
    use tempfile::{tempdir, TempDir};

    fn setup(temp: &TempDir, meta: Arc<dyn MetaStore>) -> (SegmentsManager, SegmentsFlusher) {
        let dir = JournalDir::open(temp.path(), "journal", true).unwrap();
        let metrics = Arc::new(JournalMetrics::new());
        let config = JournalConfig::new().max_segment_size(4096);
        let manager = SegmentsManager::open(dir, config, meta.as_ref(), Arc::clone(&metrics)).unwrap();
        (manager, SegmentsFlusher::new(meta, metrics))
    }

    fn append(manager: &mut SegmentsManager) {
        let index = manager.next_index();
        let serialized = serialize(index, ASQN_IGNORE, b"entry");
        let segment = manager.current_segment(64).unwrap();
        segment
            .append(index, compute_checksum(&serialized), &serialized)
            .unwrap();
    }

    #[test]
    fn flush_persists_last_written_index() {
        let temp = tempdir().unwrap();
        let meta = Arc::new(InMemoryMetaStore::new());
        let (mut manager, mut flusher) = setup(&temp, meta.clone());
        assert_eq!(flusher.next_flush_index(), 1);

        append(&mut manager);
        append(&mut manager);
        flusher.flush(&mut manager).unwrap();

        assert_eq!(flusher.next_flush_index(), 3);
        assert_eq!(meta.load_last_flushed_index(), Some(2));
        assert_eq!(flusher.last_flushed_index(), Some(2));
    }

    #[test]
    fn flush_is_idempotent() {
        let temp = tempdir().unwrap();
        let meta = Arc::new(InMemoryMetaStore::new());
        let (mut manager, mut flusher) = setup(&temp, meta.clone());

        // Nothing written yet
        flusher.flush(&mut manager).unwrap();
        assert!(!meta.has_last_flushed_index());

        append(&mut manager);
        flusher.flush(&mut manager).unwrap();
        flusher.flush(&mut manager).unwrap();

        assert_eq!(flusher.next_flush_index(), 2);
        assert_eq!(meta.load_last_flushed_index(), Some(1));
    }

    #[test]
    fn resumes_from_stored_index() {
        let meta = Arc::new(InMemoryMetaStore::new());
        meta.store_last_flushed_index(9).unwrap();

        let flusher = SegmentsFlusher::new(meta, Arc::new(JournalMetrics::new()));
        assert_eq!(flusher.next_flush_index(), 10);
    }

    #[test]
    fn set_and_reset() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let mut flusher = SegmentsFlusher::new(meta.clone(), Arc::new(JournalMetrics::new()));

        flusher.set_last_flushed_index(4).unwrap();
        assert_eq!(flusher.next_flush_index(), 5);
        assert_eq!(meta.load_last_flushed_index(), Some(4));

        flusher.reset(8).unwrap();
        assert_eq!(flusher.next_flush_index(), 8);
        assert!(!meta.has_last_flushed_index());
    }
}

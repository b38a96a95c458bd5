//! The journal facade and its writer, flusher and readers.
//!
//! [`SegmentedJournal`] wires the pieces of one journal together:
//!
//! ```text
//! SegmentedJournal
//! ├─ Mutex<SegmentedJournalWriter> ── SegmentsFlusher ── MetaStore
//! │          │
//! │          ▼
//! └─ Arc<RwLock<SegmentsManager>> ◄── SegmentedJournalReader (many)
//! ```
//!
//! The writer mutex serializes appends, truncations and flushes. Readers
//! share the manager and never block each other.

mod flusher;
mod reader;
mod writer;

pub use flusher::SegmentsFlusher;
pub use reader::SegmentedJournalReader;
pub use writer::SegmentedJournalWriter;

use crate::config::JournalConfig;
use crate::dir::JournalDir;
use crate::error::JournalResult;
use crate::manager::{SegmentsManager, SharedSegments};
use crate::meta::{FileMetaStore, MetaStore};
use crate::metrics::JournalMetrics;
use crate::record::JournalRecord;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A segmented, append-only journal stored in one directory.
///
/// # Example
///
/// ```rust,no_run
/// use journal_core::{JournalConfig, SegmentedJournal, ASQN_IGNORE};
/// use std::path::Path;
///
/// let journal = SegmentedJournal::open(Path::new("raft-1"), JournalConfig::default())?;
/// journal.append(ASQN_IGNORE, b"first")?;
/// journal.append(ASQN_IGNORE, b"second")?;
/// journal.flush()?;
///
/// for record in journal.open_reader() {
///     let record = record?;
///     println!("{}: {} bytes", record.index(), record.data().len());
/// }
/// # Ok::<(), journal_core::JournalError>(())
/// ```
pub struct SegmentedJournal {
    path: PathBuf,
    segments: SharedSegments,
    writer: Mutex<SegmentedJournalWriter>,
    meta: Arc<dyn MetaStore>,
    metrics: Arc<JournalMetrics>,
}

impl SegmentedJournal {
    /// Opens the journal in `path`, creating the directory if needed.
    ///
    /// Recovers from a torn tail left by a crash; see [`SegmentsManager::open`].
    ///
    /// # Errors
    ///
    /// Returns `JournalLocked` if another process has the journal open,
    /// `InvalidFormat` for an invalid configuration or damaged files,
    /// `CorruptedJournal` if recovery is impossible, or an I/O error.
    pub fn open(path: &Path, config: JournalConfig) -> JournalResult<Self> {
        config.validate()?;
        let dir = JournalDir::open(path, &config.name, true)?;
        let meta: Arc<dyn MetaStore> = Arc::new(FileMetaStore::open(&dir)?);
        Self::open_validated(dir, config, meta)
    }

    /// Opens the journal in an already locked directory with a custom meta
    /// store.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_meta_store(
        dir: JournalDir,
        config: JournalConfig,
        meta: Arc<dyn MetaStore>,
    ) -> JournalResult<Self> {
        config.validate()?;
        Self::open_validated(dir, config, meta)
    }

    fn open_validated(
        dir: JournalDir,
        config: JournalConfig,
        meta: Arc<dyn MetaStore>,
    ) -> JournalResult<Self> {
        let path = dir.path().to_path_buf();
        let metrics = Arc::new(JournalMetrics::new());
        let manager = SegmentsManager::open(dir, config, meta.as_ref(), Arc::clone(&metrics))?;
        let segments = Arc::new(RwLock::new(manager));

        let flusher = SegmentsFlusher::new(Arc::clone(&meta), Arc::clone(&metrics));
        let writer = SegmentedJournalWriter::new(Arc::clone(&segments), flusher, Arc::clone(&metrics));

        let journal = Self {
            path,
            segments,
            writer: Mutex::new(writer),
            meta,
            metrics,
        };
        info!(
            path = %journal.path.display(),
            first_index = journal.first_index(),
            last_index = journal.last_index(),
            last_flushed_index = ?journal.last_flushed_index(),
            "opened journal"
        );
        Ok(journal)
    }

    /// Returns the journal directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `data` with application sequence number `asqn`.
    ///
    /// # Errors
    ///
    /// See [`SegmentedJournalWriter::append`].
    pub fn append(&self, asqn: i64, data: &[u8]) -> JournalResult<JournalRecord> {
        self.writer.lock().append(asqn, data)
    }

    /// Appends a record serialized by another journal, byte for byte.
    ///
    /// # Errors
    ///
    /// See [`SegmentedJournalWriter::append_serialized`].
    pub fn append_serialized(&self, checksum: u32, serialized: &[u8]) -> JournalResult<JournalRecord> {
        self.writer.lock().append_serialized(checksum, serialized)
    }

    /// Makes every written entry durable.
    ///
    /// # Errors
    ///
    /// See [`SegmentedJournalWriter::flush`].
    pub fn flush(&self) -> JournalResult<()> {
        self.writer.lock().flush()
    }

    /// Removes every entry after `index`.
    ///
    /// # Errors
    ///
    /// See [`SegmentedJournalWriter::delete_after`].
    pub fn delete_after(&self, index: u64) -> JournalResult<()> {
        self.writer.lock().delete_after(index)
    }

    /// Removes segments whose entries all lie below `index`.
    ///
    /// # Errors
    ///
    /// See [`SegmentedJournalWriter::delete_until`].
    pub fn delete_until(&self, index: u64) -> JournalResult<usize> {
        self.writer.lock().delete_until(index)
    }

    /// Deletes all entries; the next append gets `next_index`.
    ///
    /// # Errors
    ///
    /// See [`SegmentedJournalWriter::reset`].
    pub fn reset(&self, next_index: u64) -> JournalResult<()> {
        self.writer.lock().reset(next_index)
    }

    /// Opens a reader positioned at the first entry.
    #[must_use]
    pub fn open_reader(&self) -> SegmentedJournalReader {
        SegmentedJournalReader::new(Arc::clone(&self.segments))
    }

    /// Returns the first retained index.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.segments.read().first_index()
    }

    /// Returns the last written index, `first_index() - 1` when empty.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.segments.read().last_index()
    }

    /// Returns true if the journal holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }

    /// Returns the persisted last flushed index.
    #[must_use]
    pub fn last_flushed_index(&self) -> Option<u64> {
        self.meta.load_last_flushed_index()
    }

    /// Returns the first index not yet covered by a flush.
    #[must_use]
    pub fn next_flush_index(&self) -> u64 {
        self.writer.lock().flusher().next_flush_index()
    }

    /// Returns the journal metrics.
    #[must_use]
    pub fn metrics(&self) -> &JournalMetrics {
        &self.metrics
    }

    /// Closes the journal and releases its directory lock.
    ///
    /// Unflushed entries stay written but are not synced. Subsequent
    /// operations fail with `JournalClosed`. Calling it again has no effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be released.
    pub fn close(&self) -> JournalResult<()> {
        let _writer = self.writer.lock();
        self.segments.write().close()
    }
}

impl std::fmt::Debug for SegmentedJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedJournal")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

//! Test fixtures and journal helpers.
//!
//! Provides temporary journals that clean up after themselves and can be
//! closed and reopened to exercise recovery.

use journal_core::{JournalConfig, JournalRecord, SegmentedJournal};
use std::path::Path;
use tempfile::TempDir;

/// Configuration with small segments so tests cross segment boundaries.
///
/// Each segment holds 960 bytes of frames.
pub fn small_config() -> JournalConfig {
    JournalConfig::new().max_segment_size(1024).index_density(4)
}

/// A journal in a temporary directory.
pub struct TempJournal {
    journal: Option<SegmentedJournal>,
    config: JournalConfig,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TempJournal {
    /// Opens a journal with [`small_config`].
    pub fn new() -> Self {
        Self::with_config(small_config())
    }

    /// Opens a journal with `config`.
    pub fn with_config(config: JournalConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal =
            SegmentedJournal::open(temp_dir.path(), config.clone()).expect("Failed to open journal");
        Self {
            journal: Some(journal),
            config,
            temp_dir,
        }
    }

    /// Returns the journal directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Closes the journal, leaving its files for inspection or tampering.
    pub fn close(&mut self) {
        if let Some(journal) = self.journal.take() {
            journal.close().expect("Failed to close journal");
        }
    }

    /// Closes and reopens the journal, running recovery.
    pub fn reopen(&mut self) {
        self.try_reopen().expect("Failed to reopen journal");
    }

    /// Closes and reopens the journal, returning the open error if any.
    pub fn try_reopen(&mut self) -> journal_core::JournalResult<()> {
        self.close();
        self.journal = Some(SegmentedJournal::open(self.path(), self.config.clone())?);
        Ok(())
    }

    /// Reads every entry from the first index on.
    pub fn read_all(&self) -> Vec<JournalRecord> {
        self.open_reader()
            .map(|record| record.expect("Failed to read record"))
            .collect()
    }

    /// Returns the indices of every entry.
    pub fn indices(&self) -> Vec<u64> {
        self.read_all().iter().map(JournalRecord::index).collect()
    }
}

impl Default for TempJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempJournal {
    type Target = SegmentedJournal;

    fn deref(&self) -> &Self::Target {
        self.journal.as_ref().expect("Journal is closed")
    }
}

/// Runs a test with a temporary journal.
pub fn with_temp_journal<F, R>(f: F) -> R
where
    F: FnOnce(&SegmentedJournal) -> R,
{
    let journal = TempJournal::new();
    f(&journal)
}

/// Appends `count` entries whose data is the little-endian entry number.
pub fn append_numbered(journal: &SegmentedJournal, count: u32) -> Vec<JournalRecord> {
    (0..count)
        .map(|i| {
            journal
                .append(i64::from(i), &i.to_le_bytes())
                .expect("Failed to append")
        })
        .collect()
}

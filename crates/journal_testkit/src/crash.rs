//! Crash simulation for journal recovery tests.
//!
//! Two levels are covered:
//!
//! 1. **File tampering** - corrupt, truncate or overwrite bytes of a closed
//!    journal's segment files, then reopen it
//! 2. **Interrupted writes** - a [`CrashableBackend`] that persists only a
//!    prefix of the write crossing its crash point, for driving a single
//!    [`Segment`](journal_core::Segment) directly
//!
//! ## Usage
//!
//! ```rust,ignore
//! use journal_testkit::prelude::*;
//!
//! let mut journal = TempJournal::new();
//! append_numbered(&journal, 10);
//! journal.close();
//!
//! corrupt_byte(&segment_path(journal.path(), "journal", 1), 100);
//! journal.reopen();
//! ```

use journal_core::{DESCRIPTOR_SIZE, FRAME_HEADER_SIZE, RECORD_HEADER_SIZE};
use journal_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Returns the path of segment `id` of the journal `name` in `dir`.
pub fn segment_path(dir: &Path, name: &str, id: u64) -> PathBuf {
    dir.join(format!("{name}-{id}.log"))
}

/// Returns the position of the `n`th frame (0-based) of a segment whose
/// frames all carry `data_len` bytes of data.
pub fn frame_position(n: u64, data_len: u64) -> u64 {
    let frame_len = (FRAME_HEADER_SIZE + RECORD_HEADER_SIZE) as u64 + data_len;
    DESCRIPTOR_SIZE as u64 + n * frame_len
}

/// XORs the byte at `offset` with 0xFF.
pub fn corrupt_byte(path: &Path, offset: u64) {
    let mut data = fs::read(path).expect("Failed to read file");
    data[offset as usize] ^= 0xFF;
    fs::write(path, data).expect("Failed to write file");
}

/// Overwrites `len` bytes at `offset` with `byte`.
pub fn fill_bytes(path: &Path, offset: u64, len: u64, byte: u8) {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.write_all(&vec![byte; len as usize])
        .expect("Failed to write file");
    file.sync_all().expect("Failed to sync file");
}

/// Overwrites everything from `offset` to the end of the file with `byte`.
pub fn fill_from(path: &Path, offset: u64, byte: u8) {
    let size = fs::metadata(path).expect("Failed to stat file").len();
    if size > offset {
        fill_bytes(path, offset, size - offset, byte);
    }
}

/// Cuts the file down to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.set_len(len).expect("Failed to truncate file");
}

#[derive(Debug)]
struct CrashState {
    data: Vec<u8>,
    crash_after: usize,
    written: usize,
    crashed: bool,
}

/// A storage backend that stops persisting writes at a byte threshold.
///
/// The write that crosses the threshold persists only the bytes before it
/// and fails, as does every later write or sync. The persisted bytes stay
/// reachable through a [`CrashHandle`] after the backend has been moved
/// into a segment.
#[derive(Debug)]
pub struct CrashableBackend {
    state: Arc<Mutex<CrashState>>,
}

/// Observes and controls a [`CrashableBackend`].
#[derive(Debug, Clone)]
pub struct CrashHandle {
    state: Arc<Mutex<CrashState>>,
}

impl CrashableBackend {
    /// Creates an empty backend that never crashes until told to.
    pub fn new() -> (Self, CrashHandle) {
        Self::with_data(Vec::new())
    }

    /// Creates a backend holding `data`.
    pub fn with_data(data: Vec<u8>) -> (Self, CrashHandle) {
        let state = Arc::new(Mutex::new(CrashState {
            data,
            crash_after: usize::MAX,
            written: 0,
            crashed: false,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            CrashHandle { state },
        )
    }
}

impl CrashHandle {
    /// Crashes once `bytes` more bytes have been written.
    pub fn crash_after(&self, bytes: usize) {
        let mut state = self.state.lock();
        state.crash_after = state.written.saturating_add(bytes);
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.state.lock().crashed
    }

    /// Returns the bytes persisted so far.
    pub fn persisted(&self) -> Vec<u8> {
        self.state.lock().data.clone()
    }

    /// Returns an in-memory backend holding the persisted bytes, as a
    /// restarted process would find them.
    pub fn recover(&self) -> InMemoryBackend {
        InMemoryBackend::with_data(self.persisted())
    }
}

fn crashed_error() -> StorageError {
    StorageError::Io(std::io::Error::other("simulated crash"))
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let state = self.state.lock();
        let size = state.data.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(state.data[offset as usize..end as usize].to_vec())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(crashed_error());
        }

        let room = state.crash_after.saturating_sub(state.written);
        let persisted = data.len().min(room);
        let start = offset as usize;
        let end = start + persisted;
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[start..end].copy_from_slice(&data[..persisted]);
        state.written += persisted;

        if persisted < data.len() {
            state.crashed = true;
            return Err(crashed_error());
        }
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.sync()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.state.lock().crashed {
            return Err(crashed_error());
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.state.lock().data.len() as u64)
    }

    fn preallocate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(crashed_error());
        }
        let current = state.data.len() as u64;
        if new_size < current {
            return Err(StorageError::InvalidResize {
                current,
                requested: new_size,
            });
        }
        state.data.resize(new_size as usize, 0);
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(crashed_error());
        }
        let current = state.data.len() as u64;
        if new_size > current {
            return Err(StorageError::InvalidResize {
                current,
                requested: new_size,
            });
        }
        state.data.truncate(new_size as usize);
        Ok(())
    }
}

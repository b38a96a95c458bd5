//! Persistent journal metadata.
//!
//! The meta store records the last flushed index, the durable watermark of
//! the journal. Recovery trusts entries at or below it as durable.
//!
//! ## Meta File Format
//!
//! ```text
//! | magic "JMTA" (4) | version (2) | present (1) | last_flushed_index (8) | crc32 (4) |
//! ```

use crate::dir::{sync_directory, JournalDir};
use crate::error::{JournalError, JournalResult};
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

const META_MAGIC: &[u8; 4] = b"JMTA";
const META_VERSION: u16 = 1;
const META_SIZE: usize = 19;
const CRC_OFFSET: usize = META_SIZE - 4;

/// Storage for the last flushed index.
///
/// Implementations must make `store` and `reset` crash-atomic: after a
/// crash, `load` returns either the old or the new value.
pub trait MetaStore: Send + Sync {
    /// Returns the last flushed index, if one was stored.
    fn load_last_flushed_index(&self) -> Option<u64>;

    /// Persists `index` as the last flushed index.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn store_last_flushed_index(&self, index: u64) -> JournalResult<()>;

    /// Removes the stored index.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn reset_last_flushed_index(&self) -> JournalResult<()>;

    /// Returns true if a last flushed index is stored.
    fn has_last_flushed_index(&self) -> bool {
        self.load_last_flushed_index().is_some()
    }
}

/// Meta store backed by a file in the journal directory.
///
/// The value is cached in memory; every update rewrites the file through a
/// temporary file and a rename.
#[derive(Debug)]
pub struct FileMetaStore {
    dir: PathBuf,
    path: PathBuf,
    temp_path: PathBuf,
    last_flushed: RwLock<Option<u64>>,
}

impl FileMetaStore {
    /// Opens the meta store of the journal in `dir`, loading the stored value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the meta file exists but is damaged, or an
    /// I/O error.
    pub fn open(dir: &JournalDir) -> JournalResult<Self> {
        let path = dir.meta_path();
        let last_flushed = match fs::read(&path) {
            Ok(data) => decode(&data)?,
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            dir: dir.path().to_path_buf(),
            path,
            temp_path: dir.meta_temp_path(),
            last_flushed: RwLock::new(last_flushed),
        })
    }

    fn write(&self, value: Option<u64>) -> JournalResult<()> {
        let mut file = File::create(&self.temp_path)?;
        file.write_all(&encode(value))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        sync_directory(&self.dir)?;

        *self.last_flushed.write() = value;
        Ok(())
    }
}

impl MetaStore for FileMetaStore {
    fn load_last_flushed_index(&self) -> Option<u64> {
        *self.last_flushed.read()
    }

    fn store_last_flushed_index(&self, index: u64) -> JournalResult<()> {
        self.write(Some(index))
    }

    fn reset_last_flushed_index(&self) -> JournalResult<()> {
        self.write(None)
    }
}

fn encode(value: Option<u64>) -> [u8; META_SIZE] {
    let mut buf = [0u8; META_SIZE];
    buf[0..4].copy_from_slice(META_MAGIC);
    buf[4..6].copy_from_slice(&META_VERSION.to_le_bytes());
    buf[6] = u8::from(value.is_some());
    buf[7..15].copy_from_slice(&value.unwrap_or(0).to_le_bytes());
    let crc = crc32fast::hash(&buf[..CRC_OFFSET]);
    buf[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
    buf
}

fn decode(data: &[u8]) -> JournalResult<Option<u64>> {
    if data.len() != META_SIZE {
        return Err(JournalError::invalid_format(format!(
            "meta file has {} bytes, expected {META_SIZE}",
            data.len()
        )));
    }
    if &data[0..4] != META_MAGIC {
        return Err(JournalError::invalid_format("invalid meta file magic"));
    }

    let stored = u32::from_le_bytes([data[15], data[16], data[17], data[18]]);
    let computed = crc32fast::hash(&data[..CRC_OFFSET]);
    if stored != computed {
        return Err(JournalError::invalid_format(format!(
            "meta file checksum mismatch: stored {stored:08x}, computed {computed:08x}"
        )));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != META_VERSION {
        return Err(JournalError::invalid_format(format!(
            "unsupported meta file version {version}"
        )));
    }

    let mut index = [0u8; 8];
    index.copy_from_slice(&data[7..15]);
    match data[6] {
        0 => Ok(None),
        1 => Ok(Some(u64::from_le_bytes(index))),
        flag => Err(JournalError::invalid_format(format!(
            "invalid meta presence flag {flag}"
        ))),
    }
}

/// Meta store that lives only in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    last_flushed: RwLock<Option<u64>>,
}

impl InMemoryMetaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetaStore for InMemoryMetaStore {
    fn load_last_flushed_index(&self) -> Option<u64> {
        *self.last_flushed.read()
    }

    fn store_last_flushed_index(&self, index: u64) -> JournalResult<()> {
        *self.last_flushed.write() = Some(index);
        Ok(())
    }

    fn reset_last_flushed_index(&self) -> JournalResult<()> {
        *self.last_flushed.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_starts_empty() {
        let temp = tempdir().unwrap();
        let dir = JournalDir::open(temp.path(), "journal", true).unwrap();
        let store = FileMetaStore::open(&dir).unwrap();

        assert_eq!(store.load_last_flushed_index(), None);
        assert!(!store.has_last_flushed_index());
        assert!(!dir.meta_path().exists());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let temp = tempdir().unwrap();
        let dir = JournalDir::open(temp.path(), "journal", true).unwrap();

        let store = FileMetaStore::open(&dir).unwrap();
        store.store_last_flushed_index(42).unwrap();
        assert_eq!(store.load_last_flushed_index(), Some(42));
        assert!(!dir.meta_temp_path().exists());

        let reopened = FileMetaStore::open(&dir).unwrap();
        assert_eq!(reopened.load_last_flushed_index(), Some(42));

        reopened.reset_last_flushed_index().unwrap();
        let reopened = FileMetaStore::open(&dir).unwrap();
        assert!(!reopened.has_last_flushed_index());
    }

    #[test]
    fn index_zero_is_distinct_from_absent() {
        assert_eq!(decode(&encode(Some(0))).unwrap(), Some(0));
        assert_eq!(decode(&encode(None)).unwrap(), None);
    }

    #[test]
    fn damaged_meta_file_is_rejected() {
        let temp = tempdir().unwrap();
        let dir = JournalDir::open(temp.path(), "journal", true).unwrap();
        FileMetaStore::open(&dir)
            .unwrap()
            .store_last_flushed_index(7)
            .unwrap();

        let mut data = fs::read(dir.meta_path()).unwrap();
        data[8] ^= 0xFF;
        fs::write(dir.meta_path(), &data).unwrap();

        let result = FileMetaStore::open(&dir);
        assert!(matches!(result, Err(JournalError::InvalidFormat { .. })));

        fs::write(dir.meta_path(), &data[..10]).unwrap();
        assert!(FileMetaStore::open(&dir).is_err());
    }

    #[test]
    fn in_memory_store() {
        let store = InMemoryMetaStore::new();
        assert!(!store.has_last_flushed_index());

        store.store_last_flushed_index(5).unwrap();
        assert_eq!(store.load_last_flushed_index(), Some(5));

        store.reset_last_flushed_index().unwrap();
        assert_eq!(store.load_last_flushed_index(), None);
    }
}

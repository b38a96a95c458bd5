//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for one segment file.
///
/// Storage backends are **opaque byte arenas**. They provide positional
/// reads and writes plus durability and sizing operations. The journal
/// owns all format interpretation; backends know nothing about
/// descriptors or frames.
///
/// # Invariants
///
/// - `read_at` returns exactly the bytes last written at that range
/// - `write_at` past the current end grows the storage, zero-filling any gap
/// - `sync` ensures all written data is durable
/// - Backends must be `Send + Sync` so readers can share them
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` starting at `offset`, overwriting existing bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// After this returns successfully, everything previously written
    /// is guaranteed to survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Grows the storage to `new_size` bytes, zero-filling the new range.
    ///
    /// Used to preallocate a segment's fixed-capacity arena.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is smaller than the current size or
    /// the resize fails.
    fn preallocate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Shrinks the storage to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The truncation fails
    /// - `new_size` is greater than current size
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}

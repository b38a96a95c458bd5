//! # Journal Storage
//!
//! Storage backends for the segmented journal.
//!
//! This crate provides the lowest-level storage abstraction used by
//! segment files. Backends are **opaque byte arenas**: they do not
//! interpret the data they hold.
//!
//! ## Design Principles
//!
//! - Backends support positional reads and writes (segments overwrite
//!   the header slot following each new frame)
//! - No knowledge of descriptors, frames or records
//! - Must be `Send + Sync` so readers can share them with the writer
//! - The journal owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral journals
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use journal_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write_at(0, b"hello world").unwrap();
//! let data = backend.read_at(6, 5).unwrap();
//! assert_eq!(&data, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

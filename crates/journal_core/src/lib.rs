//! # Journal Core
//!
//! Segmented, append-only, crash-recoverable journal.
//!
//! This crate provides:
//! - Segment files with fixed descriptors and checksummed frames
//! - A segments manager that loads, rolls, truncates and deletes segments
//! - A single writer that appends, truncates and resets the journal
//! - A flusher tracking the durable watermark through a [`MetaStore`]
//! - Readers that verify frames and cross segment boundaries
//!
//! ## Example
//!
//! ```rust,no_run
//! use journal_core::{JournalConfig, SegmentedJournal, ASQN_IGNORE};
//! use std::path::Path;
//!
//! let journal = SegmentedJournal::open(Path::new("data"), JournalConfig::default())?;
//! let record = journal.append(ASQN_IGNORE, b"payload")?;
//! journal.flush()?;
//!
//! let mut reader = journal.open_reader();
//! reader.seek(record.index());
//! let read = reader.next().transpose()?;
//! assert_eq!(read.as_ref().map(|r| r.data().as_ref()), Some(&b"payload"[..]));
//! # Ok::<(), journal_core::JournalError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod journal;
mod manager;
mod meta;
mod metrics;
mod record;
mod segment;

pub use config::JournalConfig;
pub use dir::JournalDir;
pub use error::{JournalError, JournalResult};
pub use journal::{SegmentedJournal, SegmentedJournalReader, SegmentedJournalWriter, SegmentsFlusher};
pub use manager::{SegmentsManager, SharedSegments};
pub use meta::{FileMetaStore, InMemoryMetaStore, MetaStore};
pub use metrics::{JournalMetrics, MetricsSnapshot};
pub use record::{compute_checksum, JournalRecord, RecordHeader, ASQN_IGNORE, RECORD_HEADER_SIZE};
pub use segment::{
    Frame, Segment, SegmentDescriptor, SparseIndex, TornTail, DESCRIPTOR_SIZE, DESCRIPTOR_VERSION,
    FRAME_HEADER_SIZE,
};

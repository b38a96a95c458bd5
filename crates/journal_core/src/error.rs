//! Error types for journal operations.

use std::io;
use thiserror::Error;

/// Result type for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors that can occur in journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] journal_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal content is corrupted and cannot be recovered.
    #[error("corrupted journal: {message}")]
    CorruptedJournal {
        /// Description of the corruption.
        message: String,
    },

    /// A frame's stored checksum does not match its content.
    #[error("checksum mismatch at index {index}: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch {
        /// Index the frame was expected to hold.
        index: u64,
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed from the frame's content.
        actual: u32,
    },

    /// A caller-supplied checksum does not match the record it describes.
    #[error("invalid checksum: expected {expected:08x}, record has {actual:08x}")]
    InvalidChecksum {
        /// Checksum supplied by the caller.
        expected: u32,
        /// Checksum computed from the supplied record.
        actual: u32,
    },

    /// A record was appended at an index that does not follow the last one.
    #[error("invalid index: expected {expected}, got {actual}")]
    InvalidIndex {
        /// The next index the journal can accept.
        expected: u64,
        /// The index carried by the record.
        actual: u64,
    },

    /// A serialized record could not be decoded.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// A record does not fit into an empty segment.
    #[error("entry of {size} bytes exceeds the maximum of {max} bytes per segment")]
    EntryTooLarge {
        /// Encoded frame size.
        size: u64,
        /// Largest frame an empty segment can hold.
        max: u64,
    },

    /// Not enough free disk space to allocate a new segment.
    #[error("out of disk space: {available} bytes available, {required} required")]
    OutOfDiskSpace {
        /// Bytes available on the journal's file system.
        available: u64,
        /// Bytes required.
        required: u64,
    },

    /// Invalid descriptor, meta file or configuration.
    #[error("invalid journal format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Another process holds the journal directory.
    #[error("journal locked: another process has exclusive access")]
    JournalLocked,

    /// The journal has been closed.
    #[error("journal is closed")]
    JournalClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl JournalError {
    /// Creates a corrupted journal error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::CorruptedJournal {
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the error reports damaged journal content.
    ///
    /// A node seeing one of these outside startup recovery cannot safely
    /// serve or replicate its log.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptedJournal { .. } | Self::ChecksumMismatch { .. } | Self::InvalidFormat { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_classification() {
        assert!(JournalError::corrupted("gap").is_corruption());
        assert!(JournalError::ChecksumMismatch {
            index: 3,
            expected: 1,
            actual: 2
        }
        .is_corruption());
        assert!(!JournalError::JournalClosed.is_corruption());
        assert!(!JournalError::InvalidIndex {
            expected: 2,
            actual: 5
        }
        .is_corruption());
    }

    #[test]
    fn display_includes_details() {
        let err = JournalError::InvalidIndex {
            expected: 4,
            actual: 9,
        };
        assert_eq!(err.to_string(), "invalid index: expected 4, got 9");

        let err = JournalError::ChecksumMismatch {
            index: 7,
            expected: 0xAB,
            actual: 0xCD,
        };
        assert!(err.to_string().contains("index 7"));
    }
}

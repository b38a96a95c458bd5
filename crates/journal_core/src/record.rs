//! Journal records and their serialized form.
//!
//! ## Serialized Record Format
//!
//! ```text
//! | index (8) | asqn (8) | data (N) |
//! ```
//!
//! The serialized record is what the frame checksum covers and what is
//! handed back to callers, so a follower can re-append the exact bytes a
//! leader wrote.

use crate::error::{JournalError, JournalResult};
use bytes::Bytes;

/// Application sequence number meaning "none".
pub const ASQN_IGNORE: i64 = -1;

/// Size of the fixed part of a serialized record.
pub const RECORD_HEADER_SIZE: usize = 16;

/// Computes the checksum stored alongside a serialized record.
#[must_use]
pub fn compute_checksum(serialized: &[u8]) -> u32 {
    crc32fast::hash(serialized)
}

/// The fixed fields at the start of a serialized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Journal index of the record.
    pub index: u64,
    /// Application sequence number, or [`ASQN_IGNORE`].
    pub asqn: i64,
}

impl RecordHeader {
    /// Reads the header from the start of a serialized record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if fewer than 16 bytes are supplied.
    pub fn decode(serialized: &[u8]) -> JournalResult<Self> {
        if serialized.len() < RECORD_HEADER_SIZE {
            return Err(JournalError::invalid_record(format!(
                "serialized record of {} bytes is shorter than its {RECORD_HEADER_SIZE} byte header",
                serialized.len()
            )));
        }

        let mut index = [0u8; 8];
        index.copy_from_slice(&serialized[0..8]);
        let mut asqn = [0u8; 8];
        asqn.copy_from_slice(&serialized[8..16]);

        Ok(Self {
            index: u64::from_le_bytes(index),
            asqn: i64::from_le_bytes(asqn),
        })
    }
}

/// Serializes a record's index, asqn and data.
pub(crate) fn serialize(index: u64, asqn: i64, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + data.len());
    buf.extend_from_slice(&index.to_le_bytes());
    buf.extend_from_slice(&asqn.to_le_bytes());
    buf.extend_from_slice(data);
    buf
}

/// A record stored in the journal.
///
/// Cloning is cheap: `data` is a slice of the shared serialized buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    index: u64,
    asqn: i64,
    checksum: u32,
    data: Bytes,
    serialized: Bytes,
}

impl JournalRecord {
    /// Builds a record from its serialized bytes and stored checksum.
    ///
    /// The checksum is not verified here; frames verify it on read and the
    /// writer verifies caller-supplied checksums before appending.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the bytes are too short to hold a header.
    pub fn from_serialized(checksum: u32, serialized: Bytes) -> JournalResult<Self> {
        let header = RecordHeader::decode(&serialized)?;
        let data = serialized.slice(RECORD_HEADER_SIZE..);

        Ok(Self {
            index: header.index,
            asqn: header.asqn,
            checksum,
            data,
            serialized,
        })
    }

    /// Returns the journal index.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Returns the application sequence number.
    #[must_use]
    pub fn asqn(&self) -> i64 {
        self.asqn
    }

    /// Returns the checksum of the serialized record.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Returns the application data.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the exact bytes written to storage for this record.
    #[must_use]
    pub fn serialized_record(&self) -> &Bytes {
        &self.serialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_decodes_from_serialized() {
        let serialized = serialize(42, 7, b"payload");
        let header = RecordHeader::decode(&serialized).unwrap();

        assert_eq!(header.index, 42);
        assert_eq!(header.asqn, 7);
    }

    #[test]
    fn record_exposes_data_slice() {
        let serialized = serialize(3, ASQN_IGNORE, &[0xCA, 0xFE]);
        let checksum = compute_checksum(&serialized);
        let record = JournalRecord::from_serialized(checksum, Bytes::from(serialized.clone())).unwrap();

        assert_eq!(record.index(), 3);
        assert_eq!(record.asqn(), ASQN_IGNORE);
        assert_eq!(record.checksum(), checksum);
        assert_eq!(record.data().as_ref(), &[0xCA, 0xFE]);
        assert_eq!(record.serialized_record().as_ref(), serialized.as_slice());
    }

    #[test]
    fn empty_data_is_allowed() {
        let serialized = serialize(1, 0, &[]);
        assert_eq!(serialized.len(), RECORD_HEADER_SIZE);

        let record = JournalRecord::from_serialized(0, Bytes::from(serialized)).unwrap();
        assert!(record.data().is_empty());
    }

    #[test]
    fn short_record_is_rejected() {
        let result = JournalRecord::from_serialized(0, Bytes::from_static(&[1, 2, 3]));
        assert!(matches!(result, Err(JournalError::InvalidRecord { .. })));
    }

    #[test]
    fn checksum_known_value() {
        // CRC-32/IEEE check value
        assert_eq!(compute_checksum(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_checksum(b""), 0);
    }
}

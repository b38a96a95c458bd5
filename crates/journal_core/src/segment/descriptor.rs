//! Segment descriptor header.

use crate::error::{JournalError, JournalResult};

/// Magic bytes identifying a segment file.
pub const DESCRIPTOR_MAGIC: [u8; 4] = *b"JSEG";

/// Current descriptor format version.
pub const DESCRIPTOR_VERSION: u16 = 1;

/// Bytes reserved for the descriptor at the start of every segment file.
pub const DESCRIPTOR_SIZE: usize = 64;

/// Bytes of the descriptor covered by its checksum.
const ENCODED_FIELDS: usize = 26;

/// Fixed header persisted at the start of each segment file.
///
/// ```text
/// | magic (4) | version (2) | id (8) | first_index (8) | max_segment_size (4) | crc32 (4) | padding |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Segment ID (monotonically increasing, used for file naming).
    pub id: u64,
    /// First journal index stored in the segment.
    pub first_index: u64,
    /// Maximum size of the segment file, descriptor included.
    pub max_segment_size: u32,
    /// Format version the segment was created with.
    pub version: u16,
}

impl SegmentDescriptor {
    /// Creates a descriptor with the current format version.
    #[must_use]
    pub const fn new(id: u64, first_index: u64, max_segment_size: u32) -> Self {
        Self {
            id,
            first_index,
            max_segment_size,
            version: DESCRIPTOR_VERSION,
        }
    }

    /// Encodes the descriptor into its fixed-size on-disk form.
    #[must_use]
    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[0..4].copy_from_slice(&DESCRIPTOR_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..14].copy_from_slice(&self.id.to_le_bytes());
        buf[14..22].copy_from_slice(&self.first_index.to_le_bytes());
        buf[22..26].copy_from_slice(&self.max_segment_size.to_le_bytes());

        let crc = crc32fast::hash(&buf[..ENCODED_FIELDS]);
        buf[26..30].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the data is too short, the magic bytes or
    /// checksum do not match, or the version is newer than supported.
    pub fn decode(data: &[u8]) -> JournalResult<Self> {
        if data.len() < DESCRIPTOR_SIZE {
            return Err(JournalError::invalid_format(format!(
                "segment descriptor too short: {} bytes",
                data.len()
            )));
        }

        if data[0..4] != DESCRIPTOR_MAGIC {
            return Err(JournalError::invalid_format("invalid segment descriptor magic"));
        }

        let stored_crc = u32::from_le_bytes([data[26], data[27], data[28], data[29]]);
        let computed_crc = crc32fast::hash(&data[..ENCODED_FIELDS]);
        if stored_crc != computed_crc {
            return Err(JournalError::invalid_format(format!(
                "segment descriptor checksum mismatch: stored {stored_crc:08x}, computed {computed_crc:08x}"
            )));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version == 0 || version > DESCRIPTOR_VERSION {
            return Err(JournalError::invalid_format(format!(
                "unsupported segment descriptor version: {version}"
            )));
        }

        let read_u64 = |start: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[start..start + 8]);
            u64::from_le_bytes(bytes)
        };

        Ok(Self {
            id: read_u64(6),
            first_index: read_u64(14),
            max_segment_size: u32::from_le_bytes([data[22], data[23], data[24], data[25]]),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrip() {
        let descriptor = SegmentDescriptor::new(7, 1_000, 64 * 1024);
        let decoded = SegmentDescriptor::decode(&descriptor.encode()).unwrap();

        assert_eq!(decoded, descriptor);
        assert_eq!(decoded.version, DESCRIPTOR_VERSION);
    }

    #[test]
    fn padding_is_zeroed() {
        let encoded = SegmentDescriptor::new(1, 1, 4096).encode();
        assert!(encoded[30..].iter().all(|b| *b == 0));
    }

    #[test]
    fn detect_corruption() {
        let mut encoded = SegmentDescriptor::new(1, 1, 4096).encode();
        encoded[10] ^= 0xFF;

        let result = SegmentDescriptor::decode(&encoded);
        assert!(matches!(result, Err(JournalError::InvalidFormat { .. })));
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let mut encoded = SegmentDescriptor::new(1, 1, 4096).encode();
        encoded[0] = b'X';
        assert!(SegmentDescriptor::decode(&encoded).is_err());

        assert!(SegmentDescriptor::decode(&[0u8; 10]).is_err());
        assert!(SegmentDescriptor::decode(&[0u8; DESCRIPTOR_SIZE]).is_err());
    }

    #[test]
    fn rejects_future_version() {
        let mut descriptor = SegmentDescriptor::new(1, 1, 4096);
        descriptor.version = DESCRIPTOR_VERSION + 1;

        let result = SegmentDescriptor::decode(&descriptor.encode());
        assert!(matches!(result, Err(JournalError::InvalidFormat { .. })));
    }
}

//! Frame headers.

/// Size of a frame header: length (4) + checksum (4).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Header of one frame in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Length of the serialized record following the header.
    pub length: u32,
    /// Checksum of the serialized record.
    pub checksum: u32,
}

impl Frame {
    /// Decodes a header, returning `None` for an empty (zeroed) slot.
    #[must_use]
    pub fn decode_header(header: &[u8; FRAME_HEADER_SIZE]) -> Option<Self> {
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if length == 0 {
            return None;
        }

        let checksum = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        Some(Self { length, checksum })
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode_header(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Returns the size of the whole frame, header included.
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        FRAME_HEADER_SIZE as u64 + u64::from(self.length)
    }
}

/// Encodes a full frame for `serialized` followed by an empty header slot.
///
/// The trailing zeroes invalidate whatever an earlier write left at the
/// position after the new frame. They are only included when `room` allows.
pub(crate) fn encode_with_invalidation(frame: Frame, serialized: &[u8], room: u64) -> Vec<u8> {
    let frame_len = frame.frame_len();
    let invalidate = room >= frame_len + FRAME_HEADER_SIZE as u64;

    let capacity = frame_len as usize + if invalidate { FRAME_HEADER_SIZE } else { 0 };
    let mut buf = Vec::with_capacity(capacity);
    buf.extend_from_slice(&frame.encode_header());
    buf.extend_from_slice(serialized);
    if invalidate {
        buf.extend_from_slice(&[0u8; FRAME_HEADER_SIZE]);
    }
    buf
}

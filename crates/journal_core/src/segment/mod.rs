//! Segment files.
//!
//! A segment is one file holding a contiguous range of journal indices.
//! Each file starts with a fixed-size [`SegmentDescriptor`] followed by a
//! fixed-capacity arena of frames.
//!
//! ## Frame Format
//!
//! ```text
//! | length (4) | checksum (4) | serialized record (length) |
//! ```
//!
//! A zero length marks the end of the written frames. Every append zeroes
//! the header slot following the new frame so a reader never picks up a
//! frame left behind by an earlier, truncated write at that position.

mod descriptor;
mod frame;
mod index;
mod store;

pub use descriptor::{SegmentDescriptor, DESCRIPTOR_SIZE, DESCRIPTOR_VERSION};
pub use frame::{Frame, FRAME_HEADER_SIZE};
pub use index::SparseIndex;
pub use store::Segment;
pub use store::TornTail;

//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use journal_core::{JournalDir, JournalError, JournalResult, Segment, TornTail};
use journal_storage::FileBackend;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Index density used when scanning segments; only affects lookup speed.
const SCAN_INDEX_DENSITY: u64 = 64;

/// A segment file and the outcome of scanning it.
pub struct ScannedSegment {
    /// Segment ID from the file name.
    pub id: u64,
    /// Path of the segment file.
    pub path: PathBuf,
    /// The loaded segment and its first invalid frame, or why it could not
    /// be loaded.
    pub scan: JournalResult<(Segment, Option<TornTail>)>,
}

/// Locks an existing journal directory.
pub fn open_dir(path: &Path, name: &str) -> JournalResult<JournalDir> {
    JournalDir::open(path, name, false)
}

/// Scans every segment file of the journal, in ID order.
///
/// Scanning only reads; torn tails are reported, not truncated.
pub fn scan_segments(dir: &JournalDir) -> JournalResult<Vec<ScannedSegment>> {
    let segments = dir
        .list_segment_files()?
        .into_iter()
        .map(|(id, path)| {
            debug!(segment = id, path = %path.display(), "scanning segment");
            let scan = FileBackend::open_existing(&path)
                .map_err(JournalError::from)
                .and_then(|backend| Segment::open(Box::new(backend), false, SCAN_INDEX_DENSITY));
            ScannedSegment { id, path, scan }
        })
        .collect();
    Ok(segments)
}

/// Hex-encodes at most `max` bytes, marking truncated output with "..".
pub fn hex_prefix(bytes: &[u8], max: usize) -> String {
    let mut out: String = bytes
        .iter()
        .take(max)
        .map(|byte| format!("{byte:02x}"))
        .collect();
    if bytes.len() > max {
        out.push_str("..");
    }
    out
}

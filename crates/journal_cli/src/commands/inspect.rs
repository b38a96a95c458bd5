//! Inspect command implementation.

use super::{open_dir, scan_segments};
use journal_core::{FileMetaStore, JournalDir, MetaStore};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Journal inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal directory.
    pub path: String,
    /// Journal name.
    pub name: String,
    /// Persisted last flushed index.
    pub last_flushed_index: Option<u64>,
    /// First index held by the segments.
    pub first_index: Option<u64>,
    /// Last valid index held by the segments.
    pub last_index: Option<u64>,
    /// Total bytes of all segment files.
    pub total_size: u64,
    /// Per-segment details.
    pub segments: Vec<SegmentInfo>,
}

/// Details of one segment file.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Segment ID.
    pub id: u64,
    /// File name.
    pub file: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Descriptor version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u16>,
    /// Maximum segment size from the descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    /// First index of the segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_index: Option<u64>,
    /// Last valid index of the segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_index: Option<u64>,
    /// Number of valid entries.
    pub entries: u64,
    /// Bytes used by the descriptor and valid frames.
    pub used_bytes: u64,
    /// Description of the first invalid frame, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torn_tail: Option<String>,
    /// Why the segment could not be loaded, if it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, name: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dir = open_dir(path, name)?;
    let result = inspect(&dir)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Collects segment details and the flushed index of the journal in `dir`.
pub fn inspect(dir: &JournalDir) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let last_flushed_index = FileMetaStore::open(dir)?.load_last_flushed_index();

    let mut segments = Vec::new();
    for scanned in scan_segments(dir)? {
        let file_size = fs::metadata(&scanned.path)?.len();
        let file = scanned
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let info = match scanned.scan {
            Ok((segment, torn)) => SegmentInfo {
                id: scanned.id,
                file,
                file_size,
                version: Some(segment.descriptor().version),
                capacity: Some(segment.capacity()),
                first_index: Some(segment.first_index()),
                last_index: (!segment.is_empty()).then(|| segment.last_index()),
                entries: segment.entry_count(),
                used_bytes: segment.size(),
                torn_tail: torn.map(|torn| {
                    format!("index {} at position {}: {}", torn.index, torn.position, torn.cause)
                }),
                error: None,
            },
            Err(err) => SegmentInfo {
                id: scanned.id,
                file,
                file_size,
                version: None,
                capacity: None,
                first_index: None,
                last_index: None,
                entries: 0,
                used_bytes: 0,
                torn_tail: None,
                error: Some(err.to_string()),
            },
        };
        segments.push(info);
    }

    Ok(InspectResult {
        path: dir.path().display().to_string(),
        name: dir.name().to_string(),
        last_flushed_index,
        first_index: segments.iter().find_map(|s| s.first_index),
        last_index: segments.iter().rev().find_map(|s| s.last_index),
        total_size: segments.iter().map(|s| s.file_size).sum(),
        segments,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Journal: {} ({})", result.name, result.path);
    println!("  Segments:           {}", result.segments.len());
    println!("  First index:        {}", display_index(result.first_index));
    println!("  Last index:         {}", display_index(result.last_index));
    println!("  Last flushed index: {}", display_index(result.last_flushed_index));
    println!("  Total size:         {} bytes", result.total_size);
    println!();

    for segment in &result.segments {
        if let Some(error) = &segment.error {
            println!("  [{}] {}: ERROR {}", segment.id, segment.file, error);
            continue;
        }
        println!(
            "  [{}] {}: indices {}..{}, {} entries, {}/{} bytes used",
            segment.id,
            segment.file,
            display_index(segment.first_index),
            display_index(segment.last_index),
            segment.entries,
            segment.used_bytes,
            segment.capacity.unwrap_or_default(),
        );
        if let Some(torn) = &segment.torn_tail {
            println!("      torn tail: {torn}");
        }
    }
}

fn display_index(index: Option<u64>) -> String {
    index.map_or_else(|| "-".to_string(), |index| index.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_journal;
    use tempfile::tempdir;

    #[test]
    fn inspect_reports_segments() {
        let temp = tempdir().unwrap();
        write_journal(temp.path(), 40, true);

        let dir = open_dir(temp.path(), "journal").unwrap();
        let result = inspect(&dir).unwrap();

        assert!(result.segments.len() > 1);
        assert_eq!(result.first_index, Some(1));
        assert_eq!(result.last_index, Some(40));
        assert_eq!(result.last_flushed_index, Some(40));
        assert_eq!(result.segments.iter().map(|s| s.entries).sum::<u64>(), 40);
        assert!(result.segments.iter().all(|s| s.torn_tail.is_none()));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["last_index"], 40);
    }

    #[test]
    fn inspect_missing_directory_fails() {
        let temp = tempdir().unwrap();
        assert!(open_dir(&temp.path().join("missing"), "journal").is_err());
    }
}

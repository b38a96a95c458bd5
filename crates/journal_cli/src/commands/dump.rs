//! Dump command implementation.

use super::{hex_prefix, open_dir, scan_segments};
use journal_core::JournalDir;
use serde::Serialize;
use std::path::Path;

/// Bytes of record data shown per record.
const DATA_PREVIEW: usize = 32;

/// Journal record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Journal index.
    pub index: u64,
    /// Application sequence number.
    pub asqn: i64,
    /// Frame checksum, hex-encoded.
    pub checksum: String,
    /// Data size in bytes.
    pub size: usize,
    /// Leading data bytes, hex-encoded.
    pub data: String,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    name: &str,
    from: Option<u64>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = open_dir(path, name)?;
    let records = read_records(&dir, from.unwrap_or(0), limit)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => print_text_output(&records),
    }
    Ok(())
}

/// Reads up to `limit` valid records starting at index `from`.
///
/// Stops at the first segment that cannot be loaded.
pub fn read_records(
    dir: &JournalDir,
    from: u64,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    for scanned in scan_segments(dir)? {
        let (segment, _torn) = scanned.scan?;
        if segment.is_empty() || segment.last_index() < from {
            continue;
        }

        let start = from.max(segment.first_index());
        let mut position = segment
            .position_of(start)?
            .ok_or_else(|| format!("index {start} missing from segment {}", segment.id()))?;

        for index in start..=segment.last_index() {
            if records.len() >= max_records {
                return Ok(records);
            }
            let (record, next_position) = segment.read_at(position, index)?;
            records.push(RecordInfo {
                index: record.index(),
                asqn: record.asqn(),
                checksum: format!("{:08x}", record.checksum()),
                size: record.data().len(),
                data: hex_prefix(record.data(), DATA_PREVIEW),
            });
            position = next_position;
        }
    }

    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    if records.is_empty() {
        println!("No records");
        return;
    }

    for record in records {
        println!(
            "{:>10}  asqn={:<6} crc={}  {} bytes  {}",
            record.index, record.asqn, record.checksum, record.size, record.data
        );
    }
    println!();
    println!("Total: {} records", records.len());
}

//! Verify command implementation.

use super::{open_dir, scan_segments};
use journal_core::{FileMetaStore, JournalDir, MetaStore};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Verification result.
#[derive(Debug, Default, Serialize)]
pub struct VerifyResult {
    /// Number of segment files checked.
    pub segments_checked: usize,
    /// Number of valid entries found.
    pub entries_checked: u64,
    /// Problems recovery would repair on the next open.
    pub warnings: Vec<String>,
    /// Problems that prevent the journal from opening.
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Returns true if the journal would open.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, name: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dir = open_dir(path, name)?;
    let result = verify(&dir)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(path, &result),
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}

/// Checks every segment of the journal in `dir` the way recovery would.
pub fn verify(dir: &JournalDir) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();

    let last_flushed = match FileMetaStore::open(dir) {
        Ok(meta) => meta.load_last_flushed_index(),
        Err(err) => {
            result.errors.push(format!("meta file: {err}"));
            None
        }
    };

    let scanned = scan_segments(dir)?;
    let count = scanned.len();
    let mut previous: Option<(u64, u64)> = None;
    // Last index recovery would keep
    let mut recovered_last: Option<u64> = None;
    let mut truncated = false;

    for (position, segment) in scanned.into_iter().enumerate() {
        result.segments_checked += 1;
        let id = segment.id;

        let (segment, torn) = match segment.scan {
            Ok(loaded) => loaded,
            Err(err) => {
                result.errors.push(format!("segment {id}: {err}"));
                previous = None;
                continue;
            }
        };

        if segment.id() != id {
            result.errors.push(format!(
                "segment file {id} holds segment {}",
                segment.id()
            ));
        }
        if let Some((previous_id, previous_last)) = previous {
            if id != previous_id + 1 {
                result
                    .errors
                    .push(format!("missing segment between {previous_id} and {id}"));
            }
            if segment.first_index() != previous_last + 1 {
                if position + 1 == count {
                    result.warnings.push(format!(
                        "segment {id} restarts at index {} after an interrupted reset",
                        segment.first_index()
                    ));
                } else {
                    result.errors.push(format!(
                        "segment {id} starts at index {}, expected {}",
                        segment.first_index(),
                        previous_last + 1
                    ));
                }
            }
        }
        previous = Some((id, segment.last_index()));
        result.entries_checked += segment.entry_count();

        if truncated {
            result
                .warnings
                .push(format!("segment {id} follows a torn tail and would be deleted"));
            continue;
        }
        recovered_last = Some(segment.last_index());

        if let Some(torn) = torn {
            let flushed = last_flushed.is_some_and(|flushed| torn.index <= flushed);
            let description = format!(
                "segment {id}: invalid frame for index {} at position {}: {}",
                torn.index, torn.position, torn.cause
            );
            debug!(segment = id, index = torn.index, flushed, "found invalid frame");
            if !flushed {
                result
                    .warnings
                    .push(format!("{description} (would be truncated)"));
                truncated = true;
            } else {
                result.errors.push(description);
            }
        }
    }

    if let Some(flushed) = last_flushed {
        let last = recovered_last.unwrap_or(0);
        if flushed > last {
            result.errors.push(format!(
                "last flushed index {flushed} is beyond the last valid entry {last}"
            ));
        }
    }

    debug!(
        segments = result.segments_checked,
        entries = result.entries_checked,
        warnings = result.warnings.len(),
        errors = result.errors.len(),
        "verified journal"
    );
    Ok(result)
}

fn print_result_lines(label: &str, lines: &[String]) {
    for line in lines {
        println!("    {label}: {line}");
    }
}

fn print_text_output(path: &Path, result: &VerifyResult) {
    println!("Verifying journal at {}", path.display());
    println!(
        "  segments checked: {}, valid entries: {}",
        result.segments_checked, result.entries_checked
    );
    print_result_lines("WARNING", &result.warnings);
    print_result_lines("ERROR", &result.errors);
    println!();

    if result.is_ok() {
        println!("✓ Journal verification passed");
    } else {
        println!("✗ Journal verification failed");
    }
}

//! Benchmark utilities.

use journal_core::{JournalConfig, SegmentedJournal, ASQN_IGNORE};
use rand::Rng;
use tempfile::TempDir;

/// Generate random entry data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Configuration used by the journal benchmarks.
pub fn bench_config() -> JournalConfig {
    JournalConfig::new()
        .max_segment_size(4 * 1024 * 1024)
        .index_density(64)
}

/// Opens a journal in a fresh temporary directory.
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_journal(config: JournalConfig) -> (TempDir, SegmentedJournal) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let journal = SegmentedJournal::open(temp_dir.path(), config).expect("Failed to open journal");
    (temp_dir, journal)
}

/// Opens a journal holding `count` entries of `size` random bytes.
pub fn populated_journal(count: usize, size: usize) -> (TempDir, SegmentedJournal) {
    let (temp_dir, journal) = temp_journal(bench_config());
    let data = random_data(size);
    for _ in 0..count {
        journal.append(ASQN_IGNORE, &data).expect("Failed to append");
    }
    journal.flush().expect("Failed to flush");
    (temp_dir, journal)
}

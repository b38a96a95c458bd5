//! End-to-end scenarios over real journal directories.

use crate::crash::{corrupt_byte, fill_from, frame_position, segment_path, truncate_file};
use crate::fixtures::{append_numbered, small_config, TempJournal};
use journal_core::{
    FileMetaStore, JournalDir, JournalError, MetaStore, SegmentedJournal, ASQN_IGNORE,
    DESCRIPTOR_SIZE, FRAME_HEADER_SIZE, RECORD_HEADER_SIZE,
};
use std::fs;
use std::sync::Arc;
use std::thread;

/// Data bytes of every entry written by `append_numbered`.
const NUMBERED_LEN: u64 = 4;

/// Entries of `NUMBERED_LEN` bytes that fit in one segment of `small_config`.
const PER_SEGMENT: u64 = 34;

fn segment(journal: &TempJournal, id: u64) -> std::path::PathBuf {
    segment_path(journal.path(), &journal.config().name, id)
}

/// Offset of the first data byte of the `n`th numbered entry of a segment.
fn data_offset(n: u64) -> u64 {
    frame_position(n, NUMBERED_LEN) + (FRAME_HEADER_SIZE + RECORD_HEADER_SIZE) as u64
}

#[test]
fn delete_after_lowers_persisted_flush_index() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 4);
    journal.flush().unwrap();
    assert_eq!(journal.last_flushed_index(), Some(4));

    journal.delete_after(2).unwrap();

    assert_eq!(journal.next_flush_index(), 3);
    assert_eq!(journal.last_flushed_index(), Some(2));
    assert_eq!(journal.indices(), vec![1, 2]);

    journal.reopen();
    assert_eq!(journal.last_flushed_index(), Some(2));
    assert_eq!(journal.next_flush_index(), 3);
    assert_eq!(journal.append(ASQN_IGNORE, b"three").unwrap().index(), 3);
}

#[test]
fn reset_clears_persisted_flush_index() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 2);
    journal.flush().unwrap();

    journal.reset(8).unwrap();

    assert_eq!(journal.next_flush_index(), 8);
    assert_eq!(journal.last_flushed_index(), None);
    assert!(journal.read_all().is_empty());

    journal.reopen();
    assert_eq!(journal.last_flushed_index(), None);
    assert_eq!(journal.first_index(), 8);
    assert_eq!(journal.append(ASQN_IGNORE, b"eight").unwrap().index(), 8);
}

#[test]
fn meta_file_survives_restart() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 5);
    journal.flush().unwrap();
    journal.close();

    let dir = JournalDir::open(journal.path(), &journal.config().name, false).unwrap();
    let meta = FileMetaStore::open(&dir).unwrap();
    assert_eq!(meta.load_last_flushed_index(), Some(5));

    let reopened = SegmentedJournal::open_with_meta_store(dir, small_config(), Arc::new(meta)).unwrap();
    assert_eq!(reopened.last_index(), 5);
    assert_eq!(reopened.next_flush_index(), 6);
}

#[test]
fn replicated_record_is_the_only_entry() {
    let leader = TempJournal::new();
    let written = leader.append(ASQN_IGNORE, b"payload").unwrap();

    // Leave garbage after the first frame slot of the follower's segment.
    let mut follower = TempJournal::new();
    follower.close();
    fill_from(&segment(&follower, 1), (DESCRIPTOR_SIZE + FRAME_HEADER_SIZE) as u64, 0xFF);
    follower.reopen();
    assert!(follower.is_empty());

    let replicated = follower
        .append_serialized(written.checksum(), written.serialized_record())
        .unwrap();
    assert_eq!(replicated, written);

    let records = follower.read_all();
    assert_eq!(records, vec![written.clone()]);

    follower.reopen();
    assert_eq!(follower.read_all(), vec![written]);
}

#[test]
fn rewrite_after_truncation_leaves_no_phantom() {
    let mut journal = TempJournal::new();
    journal.append(ASQN_IGNORE, &[1u8; 100]).unwrap();
    journal.append(ASQN_IGNORE, &[2u8; 100]).unwrap();
    journal.append(ASQN_IGNORE, &[3u8; 100]).unwrap();

    journal.delete_after(1).unwrap();
    journal.append(ASQN_IGNORE, b"short").unwrap();

    let records = journal.read_all();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].data().as_ref(), b"short");

    journal.reopen();
    assert_eq!(journal.indices(), vec![1, 2]);
    assert_eq!(journal.append(ASQN_IGNORE, b"next").unwrap().index(), 3);
}

#[test]
fn torn_tail_in_last_segment_is_trimmed() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 5);
    journal.flush().unwrap();
    append_numbered(&journal, 5);
    journal.close();

    corrupt_byte(&segment(&journal, 1), data_offset(9));
    journal.reopen();

    assert_eq!(journal.last_index(), 9);
    assert_eq!(journal.last_flushed_index(), Some(5));
    assert_eq!(journal.append(ASQN_IGNORE, b"again").unwrap().index(), 10);
    assert_eq!(journal.indices(), (1..=10).collect::<Vec<_>>());
}

#[test]
fn partially_written_tail_is_dropped() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 5);
    journal.flush().unwrap();
    append_numbered(&journal, 5);
    journal.close();

    truncate_file(&segment(&journal, 1), frame_position(9, NUMBERED_LEN) + 10);
    journal.reopen();

    assert_eq!(journal.last_index(), 9);
    assert_eq!(journal.indices(), (1..=9).collect::<Vec<_>>());
}

#[test]
fn losing_flushed_tail_is_fatal() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 10);
    journal.flush().unwrap();
    journal.close();

    let path = segment(&journal, 1);
    corrupt_byte(&path, data_offset(8));
    let damaged = fs::read(&path).unwrap();

    let err = journal.try_reopen().unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(fs::read(&path).unwrap(), damaged);

    // Nothing was trimmed, so repairing the byte recovers every entry
    corrupt_byte(&path, data_offset(8));
    journal.reopen();
    assert_eq!(journal.last_index(), 10);
    assert_eq!(journal.indices(), (1..=10).collect::<Vec<u64>>());
}

#[test]
fn corrupted_flushed_entry_is_fatal() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 100);
    journal.flush().unwrap();
    journal.close();

    corrupt_byte(&segment(&journal, 1), data_offset(5));

    let err = journal.try_reopen().unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn torn_unflushed_middle_segment_drops_later_segments() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 50);
    journal.flush().unwrap();
    append_numbered(&journal, 70);
    journal.close();
    assert!(segment(&journal, 4).exists());

    // Index 80 is the 12th entry of segment 3.
    corrupt_byte(&segment(&journal, 3), data_offset(80 - (2 * PER_SEGMENT + 1)));
    journal.reopen();

    assert_eq!(journal.last_index(), 79);
    assert_eq!(journal.last_flushed_index(), Some(50));
    assert!(!segment(&journal, 4).exists());
    assert_eq!(journal.append(ASQN_IGNORE, b"80").unwrap().index(), 80);
}

#[test]
fn flush_is_idempotent() {
    let journal = TempJournal::new();
    append_numbered(&journal, 3);

    journal.flush().unwrap();
    let next = journal.next_flush_index();
    journal.flush().unwrap();

    assert_eq!(journal.next_flush_index(), next);
    assert_eq!(journal.metrics().snapshot().flushes, 1);
}

#[test]
fn reading_past_the_end_is_not_an_error() {
    let journal = TempJournal::new();
    append_numbered(&journal, 3);

    let mut reader = journal.open_reader();
    assert_eq!(reader.seek(100), 4);
    assert!(reader.next().is_none());
    assert!(reader.next().is_none());
}

#[test]
fn reader_runs_alongside_writer() {
    let journal = TempJournal::new();
    let total = 500u64;

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut reader = journal.open_reader();
            let mut seen = 0u64;
            while seen < total {
                match reader.next() {
                    Some(record) => {
                        let record = record.unwrap();
                        seen += 1;
                        assert_eq!(record.index(), seen);
                        assert_eq!(record.data().as_ref(), &(seen - 1).to_le_bytes());
                    }
                    None => thread::yield_now(),
                }
            }
            seen
        });

        for i in 0..total {
            journal.append(ASQN_IGNORE, &i.to_le_bytes()).unwrap();
            if i % 50 == 0 {
                journal.flush().unwrap();
            }
        }

        assert_eq!(reader.join().unwrap(), total);
    });
}

#[test]
fn files_shrink_without_preallocation() {
    let mut journal = TempJournal::with_config(small_config().preallocate_segment_files(false));
    append_numbered(&journal, 100);

    let tail = segment(&journal, 3);
    let written = frame_position(100 - 2 * PER_SEGMENT, NUMBERED_LEN);
    assert_eq!(
        fs::metadata(&tail).unwrap().len(),
        written + FRAME_HEADER_SIZE as u64
    );

    journal.delete_after(80).unwrap();
    let kept = frame_position(80 - 2 * PER_SEGMENT, NUMBERED_LEN);
    assert_eq!(fs::metadata(&tail).unwrap().len(), kept);

    journal.reopen();
    assert_eq!(journal.last_index(), 80);
}

#[test]
fn preallocated_files_have_full_size() {
    let journal = TempJournal::new();
    append_numbered(&journal, 40);

    let size = u64::from(journal.config().max_segment_size);
    assert_eq!(fs::metadata(segment(&journal, 1)).unwrap().len(), size);
    assert_eq!(fs::metadata(segment(&journal, 2)).unwrap().len(), size);
}

#[test]
fn leftover_temp_files_are_removed() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 3);
    journal.close();

    let leftover = journal.path().join("journal-2.log.tmp");
    fs::write(&leftover, b"partial").unwrap();
    journal.reopen();

    assert!(!leftover.exists());
    assert_eq!(journal.last_index(), 3);
    append_numbered(&journal, PER_SEGMENT as u32);
    assert!(segment(&journal, 2).exists());
}

#[test]
fn compaction_survives_restart() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 100);
    journal.flush().unwrap();

    assert_eq!(journal.delete_until(70).unwrap(), 2);
    assert_eq!(journal.first_index(), 2 * PER_SEGMENT + 1);

    journal.reopen();
    assert_eq!(journal.first_index(), 2 * PER_SEGMENT + 1);
    assert_eq!(journal.last_index(), 100);
    assert!(!segment(&journal, 1).exists());

    let mut reader = journal.open_reader();
    assert_eq!(reader.seek(1), 2 * PER_SEGMENT + 1);
}

#[test]
fn missing_middle_segment_is_fatal() {
    let mut journal = TempJournal::new();
    append_numbered(&journal, 100);
    journal.close();

    fs::remove_file(segment(&journal, 2)).unwrap();
    let err = journal.try_reopen().unwrap_err();
    assert!(matches!(err, JournalError::CorruptedJournal { .. }));
}

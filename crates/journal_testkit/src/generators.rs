//! Property-based test generators using proptest.
//!
//! Provides strategies for journal operations and a reference model that
//! predicts the journal's contents after any sequence of them.

use journal_core::{JournalResult, SegmentedJournal};
use proptest::prelude::*;

/// Strategy for generating entry data (arbitrary bytes).
pub fn entry_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..200)
}

/// Strategy for generating application sequence numbers.
pub fn asqn_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![Just(journal_core::ASQN_IGNORE), 0..i64::MAX]
}

/// A single journal operation.
#[derive(Debug, Clone)]
pub enum JournalOperation {
    /// Append an entry
    Append {
        /// Application sequence number
        asqn: i64,
        /// Entry data
        data: Vec<u8>,
    },
    /// Flush
    Flush,
    /// Delete entries after `last_index - back`
    DeleteAfter {
        /// Distance back from the last index
        back: u64,
    },
    /// Reset to `last_index + skip`
    Reset {
        /// Distance ahead of the last index
        skip: u64,
    },
    /// Close and reopen the journal
    Reopen,
}

/// Strategy for generating a single operation, mostly appends.
pub fn operation_strategy() -> impl Strategy<Value = JournalOperation> {
    prop_oneof![
        8 => (asqn_strategy(), entry_data_strategy())
            .prop_map(|(asqn, data)| JournalOperation::Append { asqn, data }),
        2 => Just(JournalOperation::Flush),
        1 => (0..10u64).prop_map(|back| JournalOperation::DeleteAfter { back }),
        1 => (1..5u64).prop_map(|skip| JournalOperation::Reset { skip }),
        1 => Just(JournalOperation::Reopen),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operations_strategy(max_len: usize) -> impl Strategy<Value = Vec<JournalOperation>> {
    prop::collection::vec(operation_strategy(), 1..max_len)
}

/// Expected state of a journal.
#[derive(Debug, Clone)]
pub struct JournalModel {
    /// First retained index.
    pub first_index: u64,
    /// Retained entries as `(asqn, data)`, starting at `first_index`.
    pub entries: Vec<(i64, Vec<u8>)>,
    /// Persisted last flushed index.
    pub last_flushed_index: Option<u64>,
}

impl Default for JournalModel {
    fn default() -> Self {
        Self {
            first_index: 1,
            entries: Vec::new(),
            last_flushed_index: None,
        }
    }
}

impl JournalModel {
    /// Returns the last index, `first_index - 1` when empty.
    pub fn last_index(&self) -> u64 {
        self.first_index + self.entries.len() as u64 - 1
    }

    /// Applies an operation to the model. `Reopen` changes nothing.
    pub fn apply(&mut self, operation: &JournalOperation) {
        match operation {
            JournalOperation::Append { asqn, data } => self.entries.push((*asqn, data.clone())),
            JournalOperation::Flush => {
                if !self.entries.is_empty() {
                    self.last_flushed_index = Some(self.last_index());
                }
            }
            JournalOperation::DeleteAfter { back } => {
                let index = self.last_index().saturating_sub(*back);
                if index < self.first_index {
                    self.reset(index + 1);
                } else {
                    self.entries.truncate((index + 1 - self.first_index) as usize);
                    self.last_flushed_index = self.last_flushed_index.map(|f| f.min(index));
                }
            }
            JournalOperation::Reset { skip } => self.reset(self.last_index() + skip),
            JournalOperation::Reopen => {}
        }
    }

    fn reset(&mut self, next_index: u64) {
        self.first_index = next_index;
        self.entries.clear();
        self.last_flushed_index = None;
    }
}

/// Applies an operation to a real journal, mirroring [`JournalModel::apply`].
///
/// `Reopen` is left to the caller, which owns the journal.
pub fn apply_to_journal(journal: &SegmentedJournal, operation: &JournalOperation) -> JournalResult<()> {
    match operation {
        JournalOperation::Append { asqn, data } => journal.append(*asqn, data).map(|_| ()),
        JournalOperation::Flush => journal.flush(),
        JournalOperation::DeleteAfter { back } => {
            journal.delete_after(journal.last_index().saturating_sub(*back))
        }
        JournalOperation::Reset { skip } => journal.reset(journal.last_index() + skip),
        JournalOperation::Reopen => Ok(()),
    }
}

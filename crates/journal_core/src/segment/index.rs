//! Sparse offset index for a segment.

use std::collections::BTreeMap;

/// Maps a sample of journal indices to their byte positions in a segment.
///
/// Only every `density`-th index (and the first entry of the segment) is
/// recorded. Lookups return the closest recorded entry at or below the
/// requested index; callers scan forward from there.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    density: u64,
    positions: BTreeMap<u64, u64>,
}

impl SparseIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(density: u64) -> Self {
        Self {
            density: density.max(1),
            positions: BTreeMap::new(),
        }
    }

    /// Records the position of `index` if it falls on the sampling grid.
    pub fn record(&mut self, index: u64, position: u64) {
        if self.positions.is_empty() || index % self.density == 0 {
            self.positions.insert(index, position);
        }
    }

    /// Returns the closest recorded `(index, position)` at or below `index`.
    #[must_use]
    pub fn lookup(&self, index: u64) -> Option<(u64, u64)> {
        self.positions
            .range(..=index)
            .next_back()
            .map(|(index, position)| (*index, *position))
    }

    /// Returns the closest recorded `(index, position)` at or below `position`.
    ///
    /// Positions grow with indices, so this walks entries from the top.
    #[must_use]
    pub fn floor_by_position(&self, position: u64) -> Option<(u64, u64)> {
        self.positions
            .iter()
            .rev()
            .find(|(_, recorded)| **recorded <= position)
            .map(|(index, recorded)| (*index, *recorded))
    }

    /// Forgets every entry above `index`.
    pub fn delete_after(&mut self, index: u64) {
        self.positions.split_off(&(index.saturating_add(1)));
    }

    /// Returns the number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

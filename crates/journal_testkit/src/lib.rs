//! # Journal Testkit
//!
//! Test utilities for the segmented journal.
//!
//! This crate provides:
//! - Test fixtures for temporary journals that can be reopened
//! - Property-based test generators and a reference model using proptest
//! - Crash simulation: torn writes, corrupted bytes, dirty arenas
//! - Cross-crate scenario tests for recovery, truncation and replication
//!
//! ## Usage
//!
//! ```rust,ignore
//! use journal_testkit::prelude::*;
//!
//! #[test]
//! fn survives_reopen() {
//!     let mut journal = TempJournal::new();
//!     journal.append(ASQN_IGNORE, b"data").unwrap();
//!     journal.reopen();
//!     assert_eq!(journal.last_index(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
#[cfg(test)]
mod scenarios;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use journal_core::ASQN_IGNORE;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;

//! Journal configuration.

use crate::error::{JournalError, JournalResult};
use crate::segment::{DESCRIPTOR_SIZE, FRAME_HEADER_SIZE};

/// Configuration for opening a journal.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Prefix for every file the journal creates in its directory.
    pub name: String,

    /// Maximum size of a single segment file, descriptor included.
    pub max_segment_size: u32,

    /// Every `index_density`-th entry gets an entry in a segment's offset index.
    pub index_density: u64,

    /// Whether new segment files are extended to `max_segment_size` up front.
    pub preallocate_segment_files: bool,

    /// Free bytes that must remain on disk before a segment is allocated (0 = no check).
    pub min_free_disk_space: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            name: "journal".to_string(),
            max_segment_size: 128 * 1024 * 1024, // 128 MB
            index_density: 100,
            preallocate_segment_files: true,
            min_free_disk_space: 0,
        }
    }
}

impl JournalConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file name prefix.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets maximum segment file size.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u32) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets the offset index density.
    #[must_use]
    pub const fn index_density(mut self, density: u64) -> Self {
        self.index_density = density;
        self
    }

    /// Sets whether segment files are preallocated.
    #[must_use]
    pub const fn preallocate_segment_files(mut self, value: bool) -> Self {
        self.preallocate_segment_files = value;
        self
    }

    /// Sets the free disk space required to allocate a segment.
    #[must_use]
    pub const fn min_free_disk_space(mut self, bytes: u64) -> Self {
        self.min_free_disk_space = bytes;
        self
    }

    /// Checks that the configuration can describe a usable journal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the name is empty or contains a path
    /// separator, the index density is zero, or a segment could not hold
    /// even an empty record.
    pub fn validate(&self) -> JournalResult<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(JournalError::invalid_format(format!(
                "invalid journal name: {:?}",
                self.name
            )));
        }

        if self.index_density == 0 {
            return Err(JournalError::invalid_format("index density must be positive"));
        }

        let minimum = (DESCRIPTOR_SIZE + 2 * FRAME_HEADER_SIZE) as u32;
        if self.max_segment_size < minimum {
            return Err(JournalError::invalid_format(format!(
                "max segment size {} is below the minimum of {minimum} bytes",
                self.max_segment_size
            )));
        }

        Ok(())
    }
}

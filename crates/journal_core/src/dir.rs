//! Journal directory management.
//!
//! One directory holds the files of one journal, all prefixed with the
//! configured name:
//!
//! ```text
//! <dir>/
//! ├─ <name>.lock        # Advisory lock for single-writer
//! ├─ <name>.meta        # Last flushed index
//! ├─ <name>-1.log       # Segment 1
//! ├─ <name>-2.log       # Segment 2
//! └─ ...
//! ```
//!
//! Segment and meta files are written under a `.tmp` name first and renamed
//! into place, so a file with its final name is always complete.

use crate::error::{JournalError, JournalResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

const LOCK_SUFFIX: &str = ".lock";
const META_SUFFIX: &str = ".meta";
const SEGMENT_SUFFIX: &str = ".log";
const TEMP_SUFFIX: &str = ".tmp";

/// Owns the directory of one journal and its lock file.
///
/// While a `JournalDir` holds the lock, no other process can open a
/// journal with the same name in the same directory.
#[derive(Debug)]
pub struct JournalDir {
    path: PathBuf,
    name: String,
    /// Lock file handle, `None` once unlocked.
    lock: Option<File>,
}

impl JournalDir {
    /// Opens a journal directory and locks it.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the journal directory
    /// * `name` - File name prefix of the journal
    /// * `create_if_missing` - If true, creates the directory if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `JournalLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, name: &str, create_if_missing: bool) -> JournalResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(JournalError::invalid_format(format!(
                    "journal directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(JournalError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(format!("{name}{LOCK_SUFFIX}")))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(JournalError::JournalLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            name: name.to_string(),
            lock: Some(lock_file),
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path of segment `id`.
    #[must_use]
    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.path.join(format!("{}-{id}{SEGMENT_SUFFIX}", self.name))
    }

    /// Returns the path a new segment `id` is written under before it is complete.
    #[must_use]
    pub fn segment_temp_path(&self, id: u64) -> PathBuf {
        self.path
            .join(format!("{}-{id}{SEGMENT_SUFFIX}{TEMP_SUFFIX}", self.name))
    }

    /// Returns the path of the meta file.
    #[must_use]
    pub fn meta_path(&self) -> PathBuf {
        self.path.join(format!("{}{META_SUFFIX}", self.name))
    }

    /// Returns the path the meta file is written under before being renamed.
    #[must_use]
    pub fn meta_temp_path(&self) -> PathBuf {
        self.path
            .join(format!("{}{META_SUFFIX}{TEMP_SUFFIX}", self.name))
    }

    /// Lists the segment files of this journal, ordered by segment ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_segment_files(&self) -> JournalResult<Vec<(u64, PathBuf)>> {
        let mut segments = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(id) = self.parse_segment_id(file_name) {
                segments.push((id, entry.path()));
            }
        }

        segments.sort_unstable_by_key(|(id, _)| *id);
        Ok(segments)
    }

    /// Extracts the segment ID from `<name>-<id>.log`.
    fn parse_segment_id(&self, file_name: &str) -> Option<u64> {
        let id = file_name
            .strip_prefix(self.name.as_str())?
            .strip_prefix('-')?
            .strip_suffix(SEGMENT_SUFFIX)?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        id.parse().ok()
    }

    /// Removes temporary files left behind by an interrupted write.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or a file cannot be
    /// removed.
    pub fn remove_temp_files(&self) -> JournalResult<usize> {
        let meta_temp = format!("{}{META_SUFFIX}{TEMP_SUFFIX}", self.name);
        let mut removed = 0;

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            let is_segment_temp = file_name
                .strip_suffix(TEMP_SUFFIX)
                .and_then(|name| self.parse_segment_id(name))
                .is_some();
            if is_segment_temp || file_name == meta_temp {
                warn!(file = %entry.path().display(), "removing leftover temporary file");
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if removed > 0 {
            self.sync_directory()?;
        }
        Ok(removed)
    }

    /// Deletes the file of segment `id`, if present.
    ///
    /// The directory is not synced; callers sync once after a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn delete_segment_file(&self, id: u64) -> JournalResult<bool> {
        let path = self.segment_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    /// Syncs the directory so that file creations, renames and deletions
    /// are durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be synced.
    pub fn sync_directory(&self) -> JournalResult<()> {
        sync_directory(&self.path)
    }

    /// Returns true while this instance holds the directory lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Releases the directory lock. Calling it again has no effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be released.
    pub fn unlock(&mut self) -> JournalResult<()> {
        if let Some(file) = self.lock.take() {
            FileExt::unlock(&file)?;
        }
        Ok(())
    }
}

/// Syncs a directory to make metadata updates durable.
#[cfg(unix)]
pub(crate) fn sync_directory(path: &Path) -> JournalResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// NTFS journals metadata updates; directories cannot be fsynced on Windows.
#[cfg(not(unix))]
pub(crate) fn sync_directory(_path: &Path) -> JournalResult<()> {
    Ok(())
}

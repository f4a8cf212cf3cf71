//! Store directory management.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                   # Advisory lock for single-writer
//! ├─ <table>.journal        # One journal per table
//! └─ sync_cursors.journal   # Per-table replication watermarks
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::TableName;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const CURSOR_FILE: &str = "sync_cursors.journal";

/// Holds the exclusive lock on a store directory.
///
/// Only one `StoreDir` can exist per directory at a time; the lock is
/// released when the value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal path for a table.
    #[must_use]
    pub fn table_path(&self, table: TableName) -> PathBuf {
        self.path.join(format!("{}.journal", table.as_str()))
    }

    /// Returns the path of the sync cursor journal.
    #[must_use]
    pub fn cursor_path(&self) -> PathBuf {
        self.path.join(CURSOR_FILE)
    }
}

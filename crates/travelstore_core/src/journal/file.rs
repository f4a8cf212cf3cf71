//! File-backed journal.

use super::frame::{decode_frames, encode_frame};
use super::Journal;
use crate::error::CoreResult;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A journal persisted to a single file.
///
/// # Durability
///
/// - with `sync_on_write`, every append is followed by `File::sync_all()`
/// - otherwise data reaches the OS on append and the disk on [`Journal::sync`]
///
/// A torn trailing frame left by a crash is truncated on open.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    file: File,
    size: u64,
    sync_on_write: bool,
}

impl FileJournal {
    /// Opens or creates a journal file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or if a frame before
    /// the final one is corrupted.
    pub fn open(path: &Path, sync_on_write: bool) -> CoreResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let data = fs::read(path)?;
        let decoded = decode_frames(&data)?;
        if decoded.valid_len < data.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                dropped = data.len() as u64 - decoded.valid_len,
                "truncating torn journal tail"
            );
            file.set_len(decoded.valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size: decoded.valid_len,
            sync_on_write,
        })
    }

    /// Returns the path to the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cuts the file back to the end of the last complete frame.
    fn discard_tail(&mut self) -> CoreResult<()> {
        self.file.set_len(self.size)?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

impl Journal for FileJournal {
    fn append(&mut self, payload: &[u8]) -> CoreResult<()> {
        let frame = encode_frame(payload);
        self.file.seek(SeekFrom::End(0))?;
        if let Err(err) = self.file.write_all(&frame) {
            if let Err(rollback) = self.discard_tail() {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to discard partial journal frame"
                );
            }
            return Err(err.into());
        }
        self.size += frame.len() as u64;
        if self.sync_on_write {
            self.file.sync_all()?;
        }
        Ok(())
    }

    fn replay(&self) -> CoreResult<Vec<Vec<u8>>> {
        let data = fs::read(&self.path)?;
        Ok(decode_frames(&data)?.payloads)
    }

    fn rewrite(&mut self, payloads: &[Vec<u8>]) -> CoreResult<()> {
        let tmp = self.path.with_extension("journal.tmp");
        {
            let mut out = File::create(&tmp)?;
            for payload in payloads {
                out.write_all(&encode_frame(payload))?;
            }
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.size = self.file.metadata()?.len();
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn sync(&mut self) -> CoreResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

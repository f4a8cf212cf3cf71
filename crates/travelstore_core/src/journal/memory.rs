//! In-memory journal.

use super::frame::{decode_frames, encode_frame};
use super::Journal;
use crate::error::CoreResult;

/// A journal held entirely in memory.
///
/// Uses the same framing as [`super::FileJournal`], so tests exercise
/// the real replay path.
#[derive(Debug, Default, Clone)]
pub struct MemoryJournal {
    data: Vec<u8>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal over pre-existing bytes.
    ///
    /// Useful for recovery tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns a copy of the raw journal bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }
}

impl Journal for MemoryJournal {
    fn append(&mut self, payload: &[u8]) -> CoreResult<()> {
        self.data.extend(encode_frame(payload));
        Ok(())
    }

    fn replay(&self) -> CoreResult<Vec<Vec<u8>>> {
        Ok(decode_frames(&self.data)?.payloads)
    }

    fn rewrite(&mut self, payloads: &[Vec<u8>]) -> CoreResult<()> {
        self.data = payloads.iter().flat_map(|p| encode_frame(p)).collect();
        Ok(())
    }

    fn sync(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

//! Append-only journals backing each table.
//!
//! A journal is an opaque sequence of framed payloads. Tables append one
//! full row image per mutation and replay the journal on open; the last
//! image for an id wins.
//!
//! ## Available journals
//!
//! - [`MemoryJournal`] - for tests and ephemeral stores
//! - [`FileJournal`] - for persistent storage using OS file APIs

mod file;
mod frame;
mod memory;

pub use file::FileJournal;
pub use memory::MemoryJournal;

use crate::error::CoreResult;

/// Durable, append-only storage for framed payloads.
///
/// # Invariants
///
/// - `replay` returns payloads in the order they were appended
/// - a payload is either fully replayed or not at all
/// - `rewrite` atomically replaces the whole journal
pub trait Journal: Send + Sync {
    /// Appends one payload.
    fn append(&mut self, payload: &[u8]) -> CoreResult<()>;

    /// Returns every intact payload in write order.
    fn replay(&self) -> CoreResult<Vec<Vec<u8>>>;

    /// Replaces the journal content with `payloads`.
    fn rewrite(&mut self, payloads: &[Vec<u8>]) -> CoreResult<()>;

    /// Forces appended data to durable storage.
    fn sync(&mut self) -> CoreResult<()>;

    /// Current journal size in bytes.
    fn size(&self) -> u64;
}

//! Per-table replication watermarks.

use crate::codec::{from_cbor, to_cbor};
use crate::error::CoreResult;
use crate::journal::{Journal, MemoryJournal};
use crate::types::{TableName, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Appends kept before the cursor journal is rewritten.
const COMPACT_AFTER: usize = 512;

#[derive(Debug, Serialize, Deserialize)]
struct CursorRecord {
    table: TableName,
    synced_at: Timestamp,
}

struct Inner {
    cursors: BTreeMap<TableName, Timestamp>,
    journal: Box<dyn Journal>,
    appended: usize,
}

/// Last successful pull time per table.
///
/// A missing cursor means the table has never been pulled and the next
/// pull fetches everything.
pub struct SyncCursors {
    inner: Mutex<Inner>,
}

impl SyncCursors {
    /// Opens cursors stored in `journal`.
    pub fn open(journal: Box<dyn Journal>) -> CoreResult<Self> {
        let mut cursors = BTreeMap::new();
        let payloads = journal.replay()?;
        let appended = payloads.len();
        for payload in payloads {
            let record: CursorRecord = from_cbor(&payload)?;
            cursors.insert(record.table, record.synced_at);
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                cursors,
                journal,
                appended,
            }),
        })
    }

    /// Creates empty cursors held in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                cursors: BTreeMap::new(),
                journal: Box::new(MemoryJournal::new()),
                appended: 0,
            }),
        }
    }

    /// Returns the watermark of `table`.
    pub fn get(&self, table: TableName) -> Option<Timestamp> {
        self.inner.lock().cursors.get(&table).copied()
    }

    /// Records a successful pull of `table` starting at `synced_at`.
    ///
    /// Watermarks never move backwards.
    pub fn advance(&self, table: TableName, synced_at: Timestamp) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.cursors.get(&table).is_some_and(|current| *current >= synced_at) {
            return Ok(());
        }

        let bytes = to_cbor(&CursorRecord { table, synced_at })?;
        inner.journal.append(&bytes)?;
        inner.cursors.insert(table, synced_at);
        inner.appended += 1;

        if inner.appended > COMPACT_AFTER {
            let payloads = inner
                .cursors
                .iter()
                .map(|(table, synced_at)| {
                    to_cbor(&CursorRecord {
                        table: *table,
                        synced_at: *synced_at,
                    })
                })
                .collect::<CoreResult<Vec<_>>>()?;
            inner.journal.rewrite(&payloads)?;
            inner.appended = payloads.len();
        }
        Ok(())
    }

    /// All watermarks.
    pub fn snapshot(&self) -> BTreeMap<TableName, Timestamp> {
        self.inner.lock().cursors.clone()
    }
}

impl std::fmt::Debug for SyncCursors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCursors")
            .field("cursors", &self.inner.lock().cursors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::FileJournal;
    use tempfile::tempdir;

    #[test]
    fn never_moves_backwards() {
        let cursors = SyncCursors::in_memory();
        assert_eq!(cursors.get(TableName::Contracts), None);

        cursors.advance(TableName::Contracts, Timestamp::from_millis(200)).unwrap();
        cursors.advance(TableName::Contracts, Timestamp::from_millis(100)).unwrap();
        assert_eq!(cursors.get(TableName::Contracts), Some(Timestamp::from_millis(200)));
        assert_eq!(cursors.get(TableName::Segments), None);
    }

    #[test]
    fn survives_reopen_and_compaction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync_cursors.journal");
        {
            let cursors = SyncCursors::open(Box::new(FileJournal::open(&path, false).unwrap())).unwrap();
            for i in 1..=(COMPACT_AFTER as u64 + 10) {
                cursors.advance(TableName::Users, Timestamp::from_millis(i)).unwrap();
            }
            cursors.advance(TableName::Partners, Timestamp::from_millis(7)).unwrap();
        }

        let cursors = SyncCursors::open(Box::new(FileJournal::open(&path, false).unwrap())).unwrap();
        assert_eq!(
            cursors.get(TableName::Users),
            Some(Timestamp::from_millis(COMPACT_AFTER as u64 + 10))
        );
        assert_eq!(cursors.get(TableName::Partners), Some(Timestamp::from_millis(7)));
        assert_eq!(cursors.snapshot().len(), 2);
    }
}

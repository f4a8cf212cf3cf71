//! Type-erased replication hooks.

use super::{Entity, Table};
use crate::error::CoreResult;
use crate::record::{RecordId, RecordMeta, RowImage, SyncStatus};
use crate::types::{TableName, Timestamp};
use serde::Serialize;

/// Row counts for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Table name.
    pub table: TableName,
    /// Live rows.
    pub live: usize,
    /// Soft-deleted rows.
    pub tombstones: usize,
    /// Rows awaiting push.
    pub dirty: usize,
    /// Rows flagged for reconciliation.
    pub conflicts: usize,
    /// Journal size in bytes.
    pub journal_bytes: u64,
}

/// The view of a table used by the replication engine.
///
/// Object-safe so the engine can walk every table without knowing entity
/// types. The engine only ever changes `sync_status` and `last_synced_at`
/// on local rows, or replaces a row wholesale with a newer remote image.
pub trait SyncTable: Send + Sync {
    /// Table name.
    fn table_name(&self) -> TableName;

    /// Images of every dirty row, tombstones included.
    fn dirty_images(&self) -> CoreResult<Vec<RowImage>>;

    /// Marks pushed rows clean.
    ///
    /// A row is only cleaned if its version is still the one that was
    /// pushed; rows edited while the push was in flight stay dirty.
    /// Returns the number of rows cleaned.
    fn acknowledge(&self, pushed: &[(RecordId, u64)], at: Timestamp) -> CoreResult<usize>;

    /// Header of a local row, tombstones included.
    fn local_meta(&self, id: RecordId) -> Option<RecordMeta>;

    /// Image of a local row, tombstones included.
    fn local_image(&self, id: RecordId) -> CoreResult<Option<RowImage>>;

    /// Stores a remote image locally as a clean row.
    ///
    /// `expected` is the local version the caller arbitrated against, `None`
    /// meaning the row was absent. The check and the write happen under one
    /// lock: if the local row has changed since, or is not older than the
    /// image, nothing is written and `false` is returned.
    fn apply_remote(
        &self,
        image: &RowImage,
        expected: Option<u64>,
        at: Timestamp,
    ) -> CoreResult<bool>;

    /// Row counts.
    fn stats(&self) -> TableStats;
}

impl<T: Entity> SyncTable for Table<T> {
    fn table_name(&self) -> TableName {
        T::TABLE
    }

    fn dirty_images(&self) -> CoreResult<Vec<RowImage>> {
        self.state
            .read()
            .dirty_rows()
            .map(|row| RowImage::encode(T::TABLE, row))
            .collect()
    }

    fn acknowledge(&self, pushed: &[(RecordId, u64)], at: Timestamp) -> CoreResult<usize> {
        let mut state = self.state.write();
        let mut cleaned = 0;
        for &(id, version) in pushed {
            let Some(current) = state.get(id) else {
                continue;
            };
            if current.version() != version || !current.meta.is_dirty() {
                continue;
            }

            let mut row = current.clone();
            row.meta.mark_synced(at);
            self.persist(&row)?;
            state.put(row);
            cleaned += 1;
        }
        Ok(cleaned)
    }

    fn local_meta(&self, id: RecordId) -> Option<RecordMeta> {
        self.state.read().get(id).map(|row| row.meta.clone())
    }

    fn local_image(&self, id: RecordId) -> CoreResult<Option<RowImage>> {
        self.state
            .read()
            .get(id)
            .map(|row| RowImage::encode(T::TABLE, row))
            .transpose()
    }

    fn apply_remote(
        &self,
        image: &RowImage,
        expected: Option<u64>,
        at: Timestamp,
    ) -> CoreResult<bool> {
        let mut row = image.decode::<T>()?;
        row.meta.mark_synced(at);

        let mut state = self.state.write();
        let current = state.get(row.id()).map(|r| r.version());
        if current != expected || current.is_some_and(|v| v >= row.version()) {
            return Ok(false);
        }
        self.persist(&row)?;
        state.put(row);
        Ok(true)
    }

    fn stats(&self) -> TableStats {
        let state = self.state.read();
        let mut stats = TableStats {
            table: T::TABLE,
            live: 0,
            tombstones: 0,
            dirty: 0,
            conflicts: 0,
            journal_bytes: self.journal.lock().size(),
        };
        for row in state.rows() {
            if row.is_deleted() {
                stats.tombstones += 1;
            } else {
                stats.live += 1;
            }
            match row.sync_status() {
                SyncStatus::Dirty => stats.dirty += 1,
                SyncStatus::Conflict => stats.conflicts += 1,
                SyncStatus::Clean => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Row;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Airport {
        code: String,
    }

    impl Entity for Airport {
        const TABLE: TableName = TableName::Itineraries;
    }

    fn airport(code: &str) -> Airport {
        Airport { code: code.into() }
    }

    #[test]
    fn acknowledge_cleans_matching_versions_only() {
        let table = Table::<Airport>::in_memory();
        let a = table.create(airport("DLA")).unwrap();
        let b = table.create(airport("NSI")).unwrap();

        let images = table.dirty_images().unwrap();
        assert_eq!(images.len(), 2);
        let pushed: Vec<_> = images.iter().map(|i| (i.id(), i.version())).collect();

        // b changes while the push is in flight
        table.update(b.id(), |x| x.code = "NSM".into()).unwrap();

        let at = Timestamp::from_millis(5_000);
        assert_eq!(table.acknowledge(&pushed, at).unwrap(), 1);

        let a = table.get_by_id(a.id(), false).unwrap();
        assert_eq!(a.sync_status(), SyncStatus::Clean);
        assert_eq!(a.meta.last_synced_at, Some(at));
        assert_eq!(a.version(), 1);

        let b = table.get_by_id(b.id(), false).unwrap();
        assert_eq!(b.sync_status(), SyncStatus::Dirty);
        assert_eq!(table.dirty_images().unwrap().len(), 1);
    }

    #[test]
    fn tombstones_are_pushed() {
        let table = Table::<Airport>::in_memory();
        let row = table.create(airport("DLA")).unwrap();
        table
            .acknowledge(&[(row.id(), 1)], Timestamp::from_millis(1))
            .unwrap();
        assert!(table.dirty_images().unwrap().is_empty());

        table.soft_delete(row.id()).unwrap();
        let images = table.dirty_images().unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].meta.is_deleted);
        assert_eq!(images[0].version(), 2);
    }

    #[test]
    fn apply_remote_stores_clean_row() {
        let table = Table::<Airport>::in_memory();
        let remote = Row {
            meta: RecordMeta::fresh(RecordId::new(), Timestamp::from_millis(10), None),
            data: airport("CDG"),
        };
        let image = RowImage::encode(TableName::Itineraries, &remote).unwrap();

        assert!(table
            .apply_remote(&image, None, Timestamp::from_millis(20))
            .unwrap());

        let local = table.get_by_id(remote.id(), false).unwrap();
        assert_eq!(local.data, airport("CDG"));
        assert_eq!(local.sync_status(), SyncStatus::Clean);
        assert_eq!(local.version(), 1);
        assert!(table.dirty_rows().is_empty());
        assert_eq!(table.local_meta(remote.id()).unwrap().version, 1);
    }

    #[test]
    fn apply_remote_refuses_a_row_edited_after_arbitration() {
        let table = Table::<Airport>::in_memory();
        let local = table.create(airport("DLA")).unwrap();
        let v2 = table.update(local.id(), |x| x.code = "NSI".into()).unwrap().unwrap();

        let mut remote = v2.clone();
        remote.meta.version = 3;
        remote.data = airport("CDG");
        let image = RowImage::encode(TableName::Itineraries, &remote).unwrap();

        // arbitrated against v2, then edited locally to v3
        table.update(local.id(), |x| x.code = "NSM".into()).unwrap();
        assert!(!table
            .apply_remote(&image, Some(2), Timestamp::from_millis(20))
            .unwrap());

        let kept = table.get_by_id(local.id(), false).unwrap();
        assert_eq!(kept.version(), 3);
        assert_eq!(kept.data, airport("NSM"));
        assert_eq!(kept.sync_status(), SyncStatus::Dirty);
    }

    #[test]
    fn apply_remote_never_moves_a_version_backwards() {
        let table = Table::<Airport>::in_memory();
        let local = table.create(airport("DLA")).unwrap();
        table.update(local.id(), |x| x.code = "NSI".into()).unwrap();

        let image = RowImage::encode(TableName::Itineraries, &local).unwrap();
        assert!(!table
            .apply_remote(&image, Some(2), Timestamp::from_millis(20))
            .unwrap());
        assert!(!table
            .apply_remote(&image, None, Timestamp::from_millis(20))
            .unwrap());
        assert_eq!(table.get_by_id(local.id(), false).unwrap().version(), 2);
    }

    #[test]
    fn stats_count_rows() {
        let table = Table::<Airport>::in_memory();
        let a = table.create(airport("A")).unwrap();
        table.create(airport("B")).unwrap();
        table.soft_delete(a.id()).unwrap();

        let stats = table.stats();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.dirty, 2);
        assert_eq!(stats.conflicts, 0);
        assert!(stats.journal_bytes > 0);
    }
}

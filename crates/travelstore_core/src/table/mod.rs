//! Generic versioned table.
//!
//! [`Table<T>`] is the single store type used by every record table. It
//! owns create/update/soft-delete/read, stamps lifecycle metadata, keeps
//! secondary indexes for the entity's natural foreign keys plus a dirty
//! set for replication, and journals every mutation.
//!
//! Per-table behaviour is added by composition: specialised tables such as
//! [`crate::ContractTable`] wrap a `Table<T>` and add query methods.
//!
//! Filtering beyond the indexed fields uses host-language closures:
//!
//! ```rust,ignore
//! let large: Vec<_> = store.cash_flows().find(false, |row| row.data.amount > limit);
//! ```

mod state;
mod sync;

pub use sync::{SyncTable, TableStats};

use crate::codec::{from_cbor, to_cbor};
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, MemoryJournal};
use crate::record::{RecordId, RecordMeta, Row};
use crate::types::{TableName, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use state::TableState;
use std::fmt;

/// A type that can be stored in a [`Table`].
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The table holding this entity.
    const TABLE: TableName;

    /// Fields that [`Table::find_by_field`] can look up.
    const INDEXED_FIELDS: &'static [&'static str] = &[];

    /// Current values of the indexed fields.
    ///
    /// Optional fields that are unset are simply omitted.
    fn index_values(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Keyed, journaled storage for one record table.
pub struct Table<T: Entity> {
    state: RwLock<TableState<T>>,
    journal: Mutex<Box<dyn Journal>>,
}

impl<T: Entity> Table<T> {
    /// Opens a table over `journal`, replaying its content.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be read or a row image
    /// cannot be decoded.
    pub fn open(journal: Box<dyn Journal>) -> CoreResult<Self> {
        let mut state = TableState::default();
        let payloads = journal.replay()?;
        let replayed = payloads.len();
        for payload in payloads {
            let row: Row<T> = from_cbor(&payload)?;
            state.put(row);
        }

        tracing::debug!(table = %T::TABLE, replayed, rows = state.len(), "table opened");

        Ok(Self {
            state: RwLock::new(state),
            journal: Mutex::new(journal),
        })
    }

    /// Creates an empty table backed by memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(TableState::default()),
            journal: Mutex::new(Box::new(MemoryJournal::new())),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> TableName {
        T::TABLE
    }

    fn persist(&self, row: &Row<T>) -> CoreResult<()> {
        let bytes = to_cbor(row)?;
        self.journal.lock().append(&bytes)
    }

    /// Creates a record with a fresh id.
    ///
    /// The row starts at version 1, dirty and not deleted.
    pub fn create(&self, data: T) -> CoreResult<Row<T>> {
        self.create_with(None, None, data)
    }

    /// Creates a record, optionally with a caller-chosen id and author.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if a row (live or tombstoned) already uses `id`.
    pub fn create_with(
        &self,
        id: Option<RecordId>,
        created_by: Option<&str>,
        data: T,
    ) -> CoreResult<Row<T>> {
        let mut state = self.state.write();
        let id = id.unwrap_or_default();
        if state.contains(id) {
            return Err(CoreError::DuplicateId {
                table: T::TABLE.as_str(),
                id,
            });
        }

        let row = Row {
            meta: RecordMeta::fresh(id, Timestamp::now(), created_by.map(str::to_string)),
            data,
        };
        self.persist(&row)?;
        state.put(row.clone());

        tracing::debug!(table = %T::TABLE, record_id = %id, "record created");
        Ok(row)
    }

    /// Applies `f` to a live record.
    ///
    /// Bumps `updated_at` and `version` and marks the row dirty. Returns
    /// `None` if the row is missing or soft-deleted.
    pub fn update<F>(&self, id: RecordId, f: F) -> CoreResult<Option<Row<T>>>
    where
        F: FnOnce(&mut T),
    {
        self.update_as(id, None, f)
    }

    /// Like [`Table::update`], recording `updated_by`.
    pub fn update_as<F>(&self, id: RecordId, updated_by: Option<&str>, f: F) -> CoreResult<Option<Row<T>>>
    where
        F: FnOnce(&mut T),
    {
        self.try_update_as(id, updated_by, |data| {
            f(data);
            Ok(())
        })
    }

    /// Applies a fallible change to a live record.
    ///
    /// If `f` returns an error nothing is written and the error is returned.
    pub fn try_update<F>(&self, id: RecordId, f: F) -> CoreResult<Option<Row<T>>>
    where
        F: FnOnce(&mut T) -> CoreResult<()>,
    {
        self.try_update_as(id, None, f)
    }

    /// Like [`Table::try_update`], recording `updated_by`.
    pub fn try_update_as<F>(&self, id: RecordId, updated_by: Option<&str>, f: F) -> CoreResult<Option<Row<T>>>
    where
        F: FnOnce(&mut T) -> CoreResult<()>,
    {
        let mut state = self.state.write();
        let Some(current) = state.get(id) else {
            return Ok(None);
        };
        if current.is_deleted() {
            return Ok(None);
        }

        let mut row = current.clone();
        f(&mut row.data)?;
        let now = Timestamp::now().max(row.meta.updated_at);
        row.meta.touch(now, updated_by);

        self.persist(&row)?;
        state.put(row.clone());

        tracing::trace!(table = %T::TABLE, record_id = %id, version = row.version(), "record updated");
        Ok(Some(row))
    }

    /// Tombstones a record.
    ///
    /// Returns `false` if the row is missing or already deleted.
    pub fn soft_delete(&self, id: RecordId) -> CoreResult<bool> {
        self.soft_delete_as(id, None)
    }

    /// Like [`Table::soft_delete`], recording `updated_by`.
    pub fn soft_delete_as(&self, id: RecordId, updated_by: Option<&str>) -> CoreResult<bool> {
        let mut state = self.state.write();
        let Some(current) = state.get(id) else {
            return Ok(false);
        };
        if current.is_deleted() {
            return Ok(false);
        }

        let mut row = current.clone();
        row.meta.is_deleted = true;
        let now = Timestamp::now().max(row.meta.updated_at);
        row.meta.touch(now, updated_by);

        self.persist(&row)?;
        state.put(row);

        tracing::debug!(table = %T::TABLE, record_id = %id, "record soft-deleted");
        Ok(true)
    }

    /// Gets a record by id.
    pub fn get_by_id(&self, id: RecordId, include_deleted: bool) -> Option<Row<T>> {
        self.state
            .read()
            .get(id)
            .filter(|row| include_deleted || !row.is_deleted())
            .cloned()
    }

    /// Returns every record in insertion order.
    pub fn get_all(&self, include_deleted: bool) -> Vec<Row<T>> {
        self.state
            .read()
            .rows()
            .filter(|row| include_deleted || !row.is_deleted())
            .cloned()
            .collect()
    }

    /// Looks up records by an indexed field, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `UnindexedField` if `field` is not one of
    /// [`Entity::INDEXED_FIELDS`].
    pub fn find_by_field(
        &self,
        field: &str,
        value: &str,
        include_deleted: bool,
    ) -> CoreResult<Vec<Row<T>>> {
        let Some(field) = T::INDEXED_FIELDS.iter().copied().find(|f| *f == field) else {
            return Err(CoreError::UnindexedField {
                table: T::TABLE.as_str(),
                field: field.to_string(),
            });
        };

        Ok(self
            .state
            .read()
            .lookup(field, value)
            .filter(|row| include_deleted || !row.is_deleted())
            .cloned()
            .collect())
    }

    /// Scans records matching `predicate`.
    ///
    /// **Warning**: this is a full table scan.
    pub fn find<P>(&self, include_deleted: bool, predicate: P) -> Vec<Row<T>>
    where
        P: Fn(&Row<T>) -> bool,
    {
        self.state
            .read()
            .rows()
            .filter(|row| include_deleted || !row.is_deleted())
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    /// Returns every dirty record, tombstones included.
    pub fn dirty_rows(&self) -> Vec<Row<T>> {
        self.state.read().dirty_rows().cloned().collect()
    }

    /// Number of live records.
    pub fn count(&self) -> usize {
        self.state.read().rows().filter(|row| !row.is_deleted()).count()
    }

    /// Rewrites the journal with one image per record.
    ///
    /// Tombstones are kept so deletions still replicate. Returns the
    /// number of images written.
    pub fn compact(&self) -> CoreResult<usize> {
        let state = self.state.read();
        let mut payloads = Vec::with_capacity(state.len());
        for row in state.rows() {
            payloads.push(to_cbor(row)?);
        }

        let mut journal = self.journal.lock();
        let before = journal.size();
        journal.rewrite(&payloads)?;
        tracing::info!(
            table = %T::TABLE,
            rows = payloads.len(),
            before,
            after = journal.size(),
            "journal compacted"
        );
        Ok(payloads.len())
    }

    /// Flushes the journal to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        self.journal.lock().sync()
    }
}

impl<T: Entity> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &T::TABLE)
            .field("rows", &self.state.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SyncStatus;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        owner: String,
        text: String,
    }

    impl Entity for Note {
        const TABLE: TableName = TableName::AuditLogs;
        const INDEXED_FIELDS: &'static [&'static str] = &["owner"];

        fn index_values(&self) -> Vec<(&'static str, String)> {
            vec![("owner", self.owner.clone())]
        }
    }

    fn note(owner: &str, text: &str) -> Note {
        Note {
            owner: owner.into(),
            text: text.into(),
        }
    }

    #[test]
    fn create_stamps_metadata() {
        let table = Table::<Note>::in_memory();
        let row = table.create(note("ana", "hello")).unwrap();

        assert_eq!(row.version(), 1);
        assert_eq!(row.sync_status(), SyncStatus::Dirty);
        assert!(!row.is_deleted());
        assert_eq!(row.meta.created_at, row.meta.updated_at);
        assert_eq!(table.get_by_id(row.id(), false), Some(row));
    }

    #[test]
    fn create_with_explicit_id_and_author() {
        let table = Table::<Note>::in_memory();
        let id = RecordId::new();
        let row = table.create_with(Some(id), Some("ana"), note("ana", "x")).unwrap();
        assert_eq!(row.id(), id);
        assert_eq!(row.meta.created_by.as_deref(), Some("ana"));

        let dup = table.create_with(Some(id), None, note("ana", "y"));
        assert!(matches!(dup, Err(CoreError::DuplicateId { .. })));
    }

    #[test]
    fn update_bumps_version_and_dirties() {
        let table = Table::<Note>::in_memory();
        let row = table.create(note("ana", "v1")).unwrap();

        let updated = table
            .update_as(row.id(), Some("ben"), |n| n.text = "v2".into())
            .unwrap()
            .unwrap();

        assert_eq!(updated.version(), 2);
        assert_eq!(updated.data.text, "v2");
        assert_eq!(updated.sync_status(), SyncStatus::Dirty);
        assert!(updated.meta.updated_at >= row.meta.updated_at);
        assert_eq!(updated.meta.updated_by.as_deref(), Some("ben"));
        assert_eq!(updated.meta.created_at, row.meta.created_at);
    }

    #[test]
    fn update_missing_or_deleted_returns_none() {
        let table = Table::<Note>::in_memory();
        assert!(table.update(RecordId::new(), |_| {}).unwrap().is_none());

        let row = table.create(note("ana", "x")).unwrap();
        assert!(table.soft_delete(row.id()).unwrap());
        assert!(table.update(row.id(), |n| n.text = "y".into()).unwrap().is_none());

        let tomb = table.get_by_id(row.id(), true).unwrap();
        assert_eq!(tomb.data.text, "x");
        assert_eq!(tomb.version(), 2);
    }

    #[test]
    fn failed_try_update_writes_nothing() {
        let table = Table::<Note>::in_memory();
        let row = table.create(note("ana", "x")).unwrap();

        let result = table.try_update(row.id(), |n| {
            n.text = "changed".into();
            Err(CoreError::invalid_format("rejected"))
        });
        assert!(result.is_err());

        let stored = table.get_by_id(row.id(), false).unwrap();
        assert_eq!(stored, row);
    }

    #[test]
    fn soft_delete_is_a_tombstone() {
        let table = Table::<Note>::in_memory();
        let row = table.create(note("ana", "x")).unwrap();

        assert!(table.soft_delete(row.id()).unwrap());
        assert!(!table.soft_delete(row.id()).unwrap());
        assert!(!table.soft_delete(RecordId::new()).unwrap());

        assert!(table.get_by_id(row.id(), false).is_none());
        let tomb = table.get_by_id(row.id(), true).unwrap();
        assert!(tomb.is_deleted());
        assert_eq!(tomb.version(), 2);
        assert_eq!(tomb.sync_status(), SyncStatus::Dirty);

        assert!(table.get_all(false).is_empty());
        assert_eq!(table.get_all(true).len(), 1);
        assert_eq!(table.dirty_rows().len(), 1);
    }

    #[test]
    fn find_by_field_uses_index() {
        let table = Table::<Note>::in_memory();
        let a = table.create(note("ana", "1")).unwrap();
        table.create(note("ben", "2")).unwrap();
        let c = table.create(note("ana", "3")).unwrap();

        let found = table.find_by_field("owner", "ana", false).unwrap();
        assert_eq!(
            found.iter().map(Row::id).collect::<Vec<_>>(),
            vec![a.id(), c.id()]
        );

        table.soft_delete(a.id()).unwrap();
        assert_eq!(table.find_by_field("owner", "ana", false).unwrap().len(), 1);
        assert_eq!(table.find_by_field("owner", "ana", true).unwrap().len(), 2);

        let err = table.find_by_field("text", "1", false).unwrap_err();
        assert!(matches!(err, CoreError::UnindexedField { .. }));
    }

    #[test]
    fn index_follows_updates() {
        let table = Table::<Note>::in_memory();
        let row = table.create(note("ana", "1")).unwrap();
        table.update(row.id(), |n| n.owner = "ben".into()).unwrap();

        assert!(table.find_by_field("owner", "ana", true).unwrap().is_empty());
        assert_eq!(table.find_by_field("owner", "ben", false).unwrap().len(), 1);
    }

    #[test]
    fn replay_restores_state() {
        let mut journal = MemoryJournal::new();
        let kept;
        {
            let table = Table::<Note>::in_memory();
            kept = table.create(note("ana", "kept")).unwrap();
            let gone = table.create(note("ben", "gone")).unwrap();
            table.update(kept.id(), |n| n.text = "kept v2".into()).unwrap();
            table.soft_delete(gone.id()).unwrap();

            for row in table.get_all(true) {
                journal.append(&to_cbor(&row).unwrap()).unwrap();
            }
        }

        let reopened = Table::<Note>::open(Box::new(journal)).unwrap();
        let row = reopened.get_by_id(kept.id(), false).unwrap();
        assert_eq!(row.data.text, "kept v2");
        assert_eq!(row.version(), 2);
        assert_eq!(reopened.count(), 1);
        assert_eq!(reopened.get_all(true).len(), 2);
    }

    #[test]
    fn find_scans_with_predicate() {
        let table = Table::<Note>::in_memory();
        table.create(note("ana", "short")).unwrap();
        table.create(note("ana", "a much longer note")).unwrap();

        let long = table.find(false, |row| row.data.text.len() > 10);
        assert_eq!(long.len(), 1);
    }

    #[test]
    fn compact_keeps_latest_images() {
        let table = Table::<Note>::in_memory();
        let row = table.create(note("ana", "1")).unwrap();
        for i in 2..6 {
            table.update(row.id(), |n| n.text = i.to_string()).unwrap();
        }
        assert_eq!(table.compact().unwrap(), 1);
        assert_eq!(table.get_by_id(row.id(), false).unwrap().version(), 5);
    }
}

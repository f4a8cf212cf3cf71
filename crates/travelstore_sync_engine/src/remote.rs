//! The remote authority abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use travelstore_core::{RecordId, RowImage, TableName, Timestamp};

/// The single remote store every table converges with.
///
/// This trait abstracts the network layer so the engine can run against a
/// real backend or the in-process [`MemoryRemote`].
pub trait RemoteAuthority: Send + Sync + 'static {
    /// Inserts or replaces `rows` keyed by id.
    ///
    /// Must be idempotent: upserting the same image twice leaves the remote
    /// as if it had been upserted once.
    fn upsert(
        &self,
        table: TableName,
        rows: Vec<RowImage>,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns every row of `table`, tombstones included, with
    /// `updated_at` strictly greater than `since`. `None` returns all rows.
    fn select_changed_since(
        &self,
        table: TableName,
        since: Option<Timestamp>,
    ) -> impl Future<Output = SyncResult<Vec<RowImage>>> + Send;
}

/// An in-process remote authority.
///
/// Used by tests and local demos. Failures can be switched on to exercise
/// the engine's transport error paths.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    tables: RwLock<HashMap<TableName, BTreeMap<RecordId, RowImage>>>,
    fail_push: AtomicBool,
    fail_pull: AtomicBool,
    upsert_calls: AtomicU64,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `image` directly, as if another client had pushed it.
    pub fn insert(&self, image: RowImage) {
        self.tables
            .write()
            .entry(image.table)
            .or_default()
            .insert(image.id(), image);
    }

    /// Returns the stored image of a row.
    pub fn get(&self, table: TableName, id: RecordId) -> Option<RowImage> {
        self.tables.read().get(&table)?.get(&id).cloned()
    }

    /// Returns every stored image of `table`.
    pub fn rows(&self, table: TableName) -> Vec<RowImage> {
        self.tables
            .read()
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes every subsequent upsert fail.
    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent select fail.
    pub fn set_fail_pull(&self, fail: bool) {
        self.fail_pull.store(fail, Ordering::SeqCst);
    }

    /// Number of upsert calls received, failed ones included.
    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

impl RemoteAuthority for MemoryRemote {
    async fn upsert(&self, table: TableName, rows: Vec<RowImage>) -> SyncResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("remote unreachable"));
        }

        let mut tables = self.tables.write();
        let stored = tables.entry(table).or_default();
        for row in rows {
            stored.insert(row.id(), row);
        }
        Ok(())
    }

    async fn select_changed_since(
        &self,
        table: TableName,
        since: Option<Timestamp>,
    ) -> SyncResult<Vec<RowImage>> {
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("remote unreachable"));
        }

        let tables = self.tables.read();
        let mut rows: Vec<RowImage> = tables
            .get(&table)
            .map(|rows| {
                rows.values()
                    .filter(|row| since.map_or(true, |since| row.meta.updated_at > since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|row| row.meta.updated_at);
        Ok(rows)
    }
}

//! Record lifecycle metadata shared by every table.
//!
//! Every stored entity is a [`Row`]: the entity's own fields plus a
//! [`RecordMeta`] header carrying the versioning and replication state.
//!
//! ## Invariants
//!
//! - `version` only ever increases; every local mutation bumps it by one
//!   and marks the row [`SyncStatus::Dirty`]
//! - deletion is a tombstone (`is_deleted = true`), never a physical removal
//! - only replication touches `sync_status` / `last_synced_at` without
//!   bumping the version

mod id;

pub use id::RecordId;

use crate::codec::{from_cbor, sha256, to_cbor};
use crate::error::CoreResult;
use crate::types::{TableName, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Replication state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Acknowledged by the remote authority.
    Clean,
    /// Has local changes not yet pushed.
    Dirty,
    /// Flagged for manual reconciliation.
    Conflict,
}

impl SyncStatus {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Clean => "clean",
            SyncStatus::Dirty => "dirty",
            SyncStatus::Conflict => "conflict",
        }
    }
}

/// Lifecycle header stamped on every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Stable record id.
    pub id: RecordId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Monotonic version, starting at 1.
    pub version: u64,
    /// Replication state.
    pub sync_status: SyncStatus,
    /// When the row was last acknowledged by the remote.
    pub last_synced_at: Option<Timestamp>,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Author of the row.
    pub created_by: Option<String>,
    /// Author of the latest change.
    pub updated_by: Option<String>,
}

impl RecordMeta {
    /// Header for a freshly created local row.
    #[must_use]
    pub fn fresh(id: RecordId, now: Timestamp, created_by: Option<String>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            version: 1,
            sync_status: SyncStatus::Dirty,
            last_synced_at: None,
            is_deleted: false,
            updated_by: created_by.clone(),
            created_by,
        }
    }

    /// Records a local mutation.
    pub fn touch(&mut self, now: Timestamp, updated_by: Option<&str>) {
        self.version += 1;
        self.updated_at = now;
        self.sync_status = SyncStatus::Dirty;
        if let Some(author) = updated_by {
            self.updated_by = Some(author.to_string());
        }
    }

    /// Records acknowledgement by the remote authority.
    pub fn mark_synced(&mut self, at: Timestamp) {
        self.sync_status = SyncStatus::Clean;
        self.last_synced_at = Some(at);
    }

    /// Returns true if the row has unpushed local changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.sync_status == SyncStatus::Dirty
    }
}

/// A stored entity together with its lifecycle header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row<T> {
    /// Lifecycle header.
    pub meta: RecordMeta,
    /// Entity fields.
    pub data: T,
}

impl<T> Row<T> {
    /// Returns the record id.
    pub fn id(&self) -> RecordId {
        self.meta.id
    }

    /// Returns the current version.
    pub fn version(&self) -> u64 {
        self.meta.version
    }

    /// Returns true if the row is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.meta.is_deleted
    }

    /// Returns the replication state.
    pub fn sync_status(&self) -> SyncStatus {
        self.meta.sync_status
    }
}

/// A table-agnostic row as exchanged with the remote authority.
///
/// The header travels in structured form so the replication engine can
/// arbitrate on versions without knowing the entity type; the entity
/// fields travel as CBOR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowImage {
    /// Owning table.
    pub table: TableName,
    /// Lifecycle header.
    pub meta: RecordMeta,
    /// CBOR-encoded entity fields.
    pub body: Vec<u8>,
}

impl RowImage {
    /// Builds an image from a typed row.
    pub fn encode<T: Serialize>(table: TableName, row: &Row<T>) -> CoreResult<Self> {
        Ok(Self {
            table,
            meta: row.meta.clone(),
            body: to_cbor(&row.data)?,
        })
    }

    /// Decodes the image back into a typed row.
    pub fn decode<T: DeserializeOwned>(&self) -> CoreResult<Row<T>> {
        Ok(Row {
            meta: self.meta.clone(),
            data: from_cbor(&self.body)?,
        })
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.meta.id
    }

    /// Returns the version carried by the image.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.meta.version
    }

    /// Hash of the entity fields and tombstone flag, ignoring sync state.
    #[must_use]
    pub fn content_hash(&self) -> [u8; 32] {
        let mut data = self.body.clone();
        data.push(u8::from(self.meta.is_deleted));
        sha256(&data)
    }
}

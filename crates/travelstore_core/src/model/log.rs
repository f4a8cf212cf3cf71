//! Audit and change logs.

use crate::record::RecordId;
use crate::table::Entity;
use crate::types::{TableName, Timestamp};
use serde::{Deserialize, Serialize};

/// A business action performed by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    /// Table of the affected record.
    pub entity_name: TableName,
    /// Affected record.
    pub entity_id: RecordId,
    /// Action name, e.g. `validate`.
    pub action: String,
    /// Who acted.
    pub user_id: Option<RecordId>,
    /// When.
    pub at: Timestamp,
    /// Free text.
    pub details: Option<String>,
}

impl Entity for AuditLog {
    const TABLE: TableName = TableName::AuditLogs;
    const INDEXED_FIELDS: &'static [&'static str] = &["entity_id", "action"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("entity_id", self.entity_id.to_string()),
            ("action", self.action.clone()),
        ]
    }
}

/// Column name marking replication conflicts.
pub const CONFLICT_COLUMN: &str = "conflict";

/// A recorded change to a single column, or a replication conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    /// Table of the changed record.
    pub table_name: TableName,
    /// Changed record.
    pub record_id: RecordId,
    /// Column name, or [`CONFLICT_COLUMN`].
    pub column_name: String,
    /// Previous value.
    pub old_value: Option<String>,
    /// New value.
    pub new_value: Option<String>,
    /// Who changed it.
    pub user_id: Option<RecordId>,
}

impl ChangeLog {
    /// A conflict entry: the local row kept a higher version than the
    /// remote image.
    #[must_use]
    pub fn conflict(
        table_name: TableName,
        record_id: RecordId,
        local: String,
        remote: String,
    ) -> Self {
        Self {
            table_name,
            record_id,
            column_name: CONFLICT_COLUMN.to_string(),
            old_value: Some(local),
            new_value: Some(remote),
            user_id: None,
        }
    }

    /// Returns true if this entry records a replication conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.column_name == CONFLICT_COLUMN
    }
}

impl Entity for ChangeLog {
    const TABLE: TableName = TableName::ChangeLogs;
    const INDEXED_FIELDS: &'static [&'static str] = &["record_id", "column_name"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("record_id", self.record_id.to_string()),
            ("column_name", self.column_name.clone()),
        ]
    }
}

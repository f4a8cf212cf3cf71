//! Conflicts command implementation.

use super::open_store;
use crate::error::CliError;
use serde::Serialize;
use std::path::Path;
use travelstore_core::{ChangeLog, Row, TableName, CONFLICT_COLUMN};

/// One unresolved replication conflict.
#[derive(Debug, Serialize)]
pub struct ConflictEntry {
    /// Change-log row id.
    pub id: String,
    /// When the conflict was recorded, in milliseconds since the epoch.
    pub recorded_at: u64,
    /// Table of the conflicting row.
    pub table: TableName,
    /// Conflicting row.
    pub record_id: String,
    /// Local version and content digest.
    pub local: Option<String>,
    /// Remote version and content digest.
    pub remote: Option<String>,
}

impl From<Row<ChangeLog>> for ConflictEntry {
    fn from(row: Row<ChangeLog>) -> Self {
        Self {
            id: row.id().to_string(),
            recorded_at: row.meta.created_at.as_millis(),
            table: row.data.table_name,
            record_id: row.data.record_id.to_string(),
            local: row.data.old_value,
            remote: row.data.new_value,
        }
    }
}

/// Runs the conflicts command.
pub fn run(path: &Path, table: Option<TableName>, format: &str) -> Result<(), CliError> {
    let store = open_store(path)?;
    let entries: Vec<ConflictEntry> = store
        .change_logs()
        .find_by_field("column_name", CONFLICT_COLUMN, false)?
        .into_iter()
        .filter(|row| table.map_or(true, |t| row.data.table_name == t))
        .map(ConflictEntry::from)
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            if entries.is_empty() {
                println!("No conflicts recorded");
                return Ok(());
            }
            println!("{} conflict(s):", entries.len());
            println!();
            for entry in &entries {
                println!(
                    "[{}] {} {}  local {}  remote {}",
                    entry.recorded_at,
                    entry.table,
                    entry.record_id,
                    entry.local.as_deref().unwrap_or("-"),
                    entry.remote.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}

//! Inspect command implementation.

use super::open_store;
use crate::error::CliError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use travelstore_core::TableStats;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Per-table statistics.
    pub tables: Vec<TableStats>,
    /// Live rows across all tables.
    pub live_count: usize,
    /// Tombstones across all tables.
    pub tombstone_count: usize,
    /// Rows awaiting push across all tables.
    pub dirty_count: usize,
    /// Total journal size in bytes.
    pub total_size: u64,
    /// Last successful pull per table, in milliseconds since the epoch.
    pub sync_cursors: BTreeMap<String, u64>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), CliError> {
    let store = open_store(path)?;
    let tables = store.stats();

    let result = InspectResult {
        path: path.display().to_string(),
        live_count: tables.iter().map(|t| t.live).sum(),
        tombstone_count: tables.iter().map(|t| t.tombstones).sum(),
        dirty_count: tables.iter().map(|t| t.dirty).sum(),
        total_size: tables.iter().map(|t| t.journal_bytes).sum(),
        sync_cursors: store
            .sync_cursors()
            .snapshot()
            .into_iter()
            .map(|(table, at)| (table.to_string(), at.as_millis()))
            .collect(),
        tables,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Travelstore Inspection");
    println!("======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!(
        "{:<20} {:>8} {:>10} {:>8} {:>9} {:>12}",
        "table", "live", "tombstones", "dirty", "conflicts", "bytes"
    );
    for t in &result.tables {
        println!(
            "{:<20} {:>8} {:>10} {:>8} {:>9} {:>12}",
            t.table.as_str(),
            t.live,
            t.tombstones,
            t.dirty,
            t.conflicts,
            t.journal_bytes
        );
    }
    println!();
    println!("Live rows:    {}", result.live_count);
    println!("Tombstones:   {}", result.tombstone_count);
    println!("Dirty rows:   {}", result.dirty_count);
    println!("Total size:   {}", format_bytes(result.total_size));

    if !result.sync_cursors.is_empty() {
        println!();
        println!("Sync watermarks:");
        for (table, at) in &result.sync_cursors {
            println!("  {:<20} {}", table, at);
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

//! CLI errors.

use thiserror::Error;
use travelstore_core::CoreError;

/// Errors surfaced by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// The command needs `--path`.
    #[error("store path required for {0}")]
    MissingPath(&'static str),

    /// `--table` did not name a known table.
    #[error("{0}")]
    UnknownTable(String),

    /// The store could not be opened or read.
    #[error(transparent)]
    Store(#[from] CoreError),

    /// JSON output failed.
    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Pool rows violate `0 <= remaining <= initial`.
    #[error("{0} pool row(s) out of bounds")]
    PoolInvariant(usize),
}

//! CLI command implementations.

pub mod conflicts;
pub mod inspect;
pub mod verify_pools;

use crate::error::CliError;
use std::path::Path;
use travelstore_core::{Store, StoreConfig};

/// Opens an existing store without creating anything.
fn open_store(path: &Path) -> Result<Store, CliError> {
    tracing::debug!(path = %path.display(), "opening store");
    Ok(Store::open(path, StoreConfig::new().create_if_missing(false))?)
}

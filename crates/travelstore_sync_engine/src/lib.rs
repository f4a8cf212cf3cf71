//! # Travelstore Sync Engine
//!
//! Replication between a local [`travelstore_core::Store`] and one remote
//! authority.
//!
//! This crate provides:
//! - The [`RemoteAuthority`] abstraction and an in-process [`MemoryRemote`]
//! - A per-table push-then-pull [`ReplicationEngine`]
//! - Version-based arbitration with durable conflict records
//! - A fixed-interval [`SyncScheduler`]
//!
//! ## Architecture
//!
//! Each table is synced independently:
//! 1. Push every dirty row (tombstones included) as an idempotent upsert
//! 2. Mark the pushed rows clean
//! 3. Pull remote rows changed since the table's watermark
//! 4. Apply them by version: the higher version wins, a local row ahead of
//!    the remote is kept and logged as a conflict
//!
//! ## Key Invariants
//!
//! - Push always happens before pull
//! - The engine never edits business fields, only sync state
//! - Transport errors are logged and retried next cycle, never raised
//! - A failed pull never advances the watermark

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod remote;
mod scheduler;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{SyncConfig, DEFAULT_SYNC_INTERVAL};
pub use engine::{
    ConflictReport, PullReport, ReplicationEngine, SyncCycleResult, SyncState, SyncStats,
    TableSyncReport,
};
pub use error::{SyncError, SyncResult};
pub use remote::{MemoryRemote, RemoteAuthority};
pub use scheduler::SyncScheduler;

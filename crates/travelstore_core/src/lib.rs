//! # Travelstore Core
//!
//! Offline-first data layer for a travel agency back office.
//!
//! This crate provides:
//! - Versioned record tables with soft delete and a dirty/clean/conflict
//!   replication lifecycle
//! - Append-only journal persistence, one journal per table
//! - Deposit and stock pools with all-or-nothing deduction
//! - The settlement workflow turning pending transactions into validated
//!   ones and writing the ledger
//!
//! ## Key Invariants
//!
//! - Every local mutation bumps `version` and marks the row dirty
//! - Rows are never physically removed; deletion is a tombstone
//! - `0 <= amount_remaining <= amount_initial` for every pool row
//! - A failed validation writes nothing
//! - Validated and cancelled are terminal
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use travelstore_core::{Actor, Role, Settlement, SettlementService, Store, StoreConfig};
//!
//! let store = Arc::new(Store::open(path, StoreConfig::default())?);
//! let service = SettlementService::new(Arc::clone(&store));
//!
//! let manager = Actor::new(user_id, Role::Manager);
//! service.validate(&manager, Settlement::Ticketed { transaction_id, segments: None })?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod cursor;
mod dir;
mod error;
mod journal;
mod model;
mod record;
mod store;
mod table;
mod types;
mod workflow;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use codec::{from_cbor, sha256, to_cbor};
pub use config::StoreConfig;
pub use cursor::SyncCursors;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult, ValidationError};
pub use journal::{FileJournal, Journal, MemoryJournal};
pub use model::{
    Airline, AuditLog, CashDirection, CashFlow, CashSource, ChangeLog, Contract, ContractStatus,
    ContractTable, ContractType, DeductionPlan, DeductionStep, Deposit, DepositPool,
    DepositPoolTable, DerivedAmounts, Itinerary, LedgerEntry, LedgerKind, LedgerSource,
    LedgerTable, NewOtherTransaction, NewTransaction, OtherTransaction, Partner, PartnerKind,
    PoolKind, PoolRow, PoolTable, Role, Segment, SegmentPricing, SegmentTable, Service, Stock,
    StockPool, StockPoolTable, System, Transaction, TransactionStatus, User, CONFLICT_COLUMN,
};
pub use record::{RecordId, RecordMeta, Row, RowImage, SyncStatus};
pub use store::Store;
pub use table::{Entity, SyncTable, Table, TableStats};
pub use types::{TableName, Timestamp};
pub use workflow::{
    Actor, ContractLocks, Settled, Settlement, SettlementService, TicketedSettlement,
    TransactionRef,
};

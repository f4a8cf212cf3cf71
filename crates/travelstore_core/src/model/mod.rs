//! Entity types stored in the record tables.

mod catalog;
mod contract;
mod ledger;
mod log;
mod pool;
mod segment;
mod transaction;

pub use catalog::{Airline, Itinerary, Partner, PartnerKind, Role, Service, System, User};
pub use contract::{Contract, ContractStatus, ContractTable, ContractType};
pub use ledger::{
    CashDirection, CashFlow, CashSource, LedgerEntry, LedgerKind, LedgerSource, LedgerTable,
};
pub use log::{AuditLog, ChangeLog, CONFLICT_COLUMN};
pub use pool::{
    DeductionPlan, DeductionStep, Deposit, DepositPool, DepositPoolTable, PoolKind, PoolRow,
    PoolTable, Stock, StockPool, StockPoolTable,
};
pub use segment::{DerivedAmounts, Segment, SegmentPricing, SegmentTable};
pub use transaction::{
    NewOtherTransaction, NewTransaction, OtherTransaction, Transaction, TransactionStatus,
};

//! The set of record tables.

use crate::config::StoreConfig;
use crate::cursor::SyncCursors;
use crate::dir::StoreDir;
use crate::error::CoreResult;
use crate::journal::{FileJournal, Journal};
use crate::model::{
    Airline, AuditLog, CashFlow, ChangeLog, ContractTable, DepositPoolTable, Itinerary,
    LedgerTable, OtherTransaction, Partner, Service, SegmentTable, StockPoolTable, System,
    Transaction, User,
};
use crate::table::{SyncTable, Table, TableStats};
use crate::types::TableName;
use crate::workflow::ContractLocks;
use std::path::Path;

/// Every record table of one agency, plus the replication cursors and the
/// settlement locks shared by every service over the store.
///
/// Opened either over a locked directory with one journal per table, or
/// entirely in memory.
#[derive(Debug)]
pub struct Store {
    dir: Option<StoreDir>,
    users: Table<User>,
    systems: Table<System>,
    services: Table<Service>,
    airlines: Table<Airline>,
    partners: Table<Partner>,
    itineraries: Table<Itinerary>,
    contracts: ContractTable,
    deposit_pools: DepositPoolTable,
    stock_pools: StockPoolTable,
    ledger: LedgerTable,
    cash_flows: Table<CashFlow>,
    transactions: Table<Transaction>,
    other_transactions: Table<OtherTransaction>,
    segments: SegmentTable,
    audit_logs: Table<AuditLog>,
    change_logs: Table<ChangeLog>,
    cursors: SyncCursors,
    locks: ContractLocks,
}

impl Store {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseLocked` if another process has the directory open,
    /// or an error if any journal cannot be replayed.
    pub fn open(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let journal = |table: TableName| -> CoreResult<Box<dyn Journal>> {
            Ok(Box::new(FileJournal::open(&dir.table_path(table), config.sync_on_write)?))
        };

        let store = Self {
            users: Table::open(journal(TableName::Users)?)?,
            systems: Table::open(journal(TableName::Systems)?)?,
            services: Table::open(journal(TableName::Services)?)?,
            airlines: Table::open(journal(TableName::Airlines)?)?,
            partners: Table::open(journal(TableName::Partners)?)?,
            itineraries: Table::open(journal(TableName::Itineraries)?)?,
            contracts: ContractTable::open(journal(TableName::Contracts)?)?,
            deposit_pools: DepositPoolTable::open(journal(TableName::DepositPools)?)?,
            stock_pools: StockPoolTable::open(journal(TableName::StockPools)?)?,
            ledger: LedgerTable::open(journal(TableName::LedgerEntries)?)?,
            cash_flows: Table::open(journal(TableName::CashFlows)?)?,
            transactions: Table::open(journal(TableName::Transactions)?)?,
            other_transactions: Table::open(journal(TableName::OtherTransactions)?)?,
            segments: SegmentTable::open(journal(TableName::Segments)?)?,
            audit_logs: Table::open(journal(TableName::AuditLogs)?)?,
            change_logs: Table::open(journal(TableName::ChangeLogs)?)?,
            cursors: SyncCursors::open(Box::new(FileJournal::open(
                &dir.cursor_path(),
                config.sync_on_write,
            )?))?,
            dir: Some(dir),
            locks: ContractLocks::new(),
        };

        tracing::info!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Creates an empty store held in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            users: Table::in_memory(),
            systems: Table::in_memory(),
            services: Table::in_memory(),
            airlines: Table::in_memory(),
            partners: Table::in_memory(),
            itineraries: Table::in_memory(),
            contracts: ContractTable::in_memory(),
            deposit_pools: DepositPoolTable::in_memory(),
            stock_pools: StockPoolTable::in_memory(),
            ledger: LedgerTable::in_memory(),
            cash_flows: Table::in_memory(),
            transactions: Table::in_memory(),
            other_transactions: Table::in_memory(),
            segments: SegmentTable::in_memory(),
            audit_logs: Table::in_memory(),
            change_logs: Table::in_memory(),
            cursors: SyncCursors::in_memory(),
            locks: ContractLocks::new(),
        }
    }

    /// Directory backing the store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Users.
    pub fn users(&self) -> &Table<User> {
        &self.users
    }

    /// Reservation systems.
    pub fn systems(&self) -> &Table<System> {
        &self.systems
    }

    /// Services.
    pub fn services(&self) -> &Table<Service> {
        &self.services
    }

    /// Airlines.
    pub fn airlines(&self) -> &Table<Airline> {
        &self.airlines
    }

    /// Partners.
    pub fn partners(&self) -> &Table<Partner> {
        &self.partners
    }

    /// Itineraries.
    pub fn itineraries(&self) -> &Table<Itinerary> {
        &self.itineraries
    }

    /// Contracts.
    pub fn contracts(&self) -> &ContractTable {
        &self.contracts
    }

    /// Deposit pools.
    pub fn deposit_pools(&self) -> &DepositPoolTable {
        &self.deposit_pools
    }

    /// Stock pools.
    pub fn stock_pools(&self) -> &StockPoolTable {
        &self.stock_pools
    }

    /// Ledger entries.
    pub fn ledger(&self) -> &LedgerTable {
        &self.ledger
    }

    /// Cash register movements.
    pub fn cash_flows(&self) -> &Table<CashFlow> {
        &self.cash_flows
    }

    /// Ticketed transactions.
    pub fn transactions(&self) -> &Table<Transaction> {
        &self.transactions
    }

    /// Other-service transactions.
    pub fn other_transactions(&self) -> &Table<OtherTransaction> {
        &self.other_transactions
    }

    /// Segments.
    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    /// Audit log.
    pub fn audit_logs(&self) -> &Table<AuditLog> {
        &self.audit_logs
    }

    /// Change log, including replication conflicts.
    pub fn change_logs(&self) -> &Table<ChangeLog> {
        &self.change_logs
    }

    /// Replication watermarks.
    pub fn sync_cursors(&self) -> &SyncCursors {
        &self.cursors
    }

    /// Per-contract settlement locks.
    pub fn contract_locks(&self) -> &ContractLocks {
        &self.locks
    }

    /// Replication view of one table.
    pub fn sync_table(&self, name: TableName) -> &dyn SyncTable {
        match name {
            TableName::Users => &self.users,
            TableName::Systems => &self.systems,
            TableName::Services => &self.services,
            TableName::Airlines => &self.airlines,
            TableName::Partners => &self.partners,
            TableName::Itineraries => &self.itineraries,
            TableName::Contracts => &*self.contracts,
            TableName::DepositPools => &*self.deposit_pools,
            TableName::StockPools => &*self.stock_pools,
            TableName::LedgerEntries => self.ledger.as_sync(),
            TableName::CashFlows => &self.cash_flows,
            TableName::Transactions => &self.transactions,
            TableName::OtherTransactions => &self.other_transactions,
            TableName::Segments => &*self.segments,
            TableName::AuditLogs => &self.audit_logs,
            TableName::ChangeLogs => &self.change_logs,
        }
    }

    /// Row counts for every table.
    pub fn stats(&self) -> Vec<TableStats> {
        TableName::ALL
            .iter()
            .map(|name| self.sync_table(*name).stats())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::model::{Partner, PartnerKind};
    use crate::record::{RecordId, SyncStatus};
    use crate::types::Timestamp;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn partner(name: &str) -> Partner {
        Partner {
            name: name.into(),
            kind: PartnerKind::Agency,
        }
    }

    #[test]
    fn every_table_is_reachable() {
        let store = Store::in_memory();
        for name in TableName::ALL {
            assert_eq!(store.sync_table(name).table_name(), name);
        }
        assert_eq!(store.stats().len(), TableName::ALL.len());
    }

    #[test]
    fn reopen_replays_every_table() {
        let dir = tempdir().unwrap();
        let (partner_id, pool_id) = {
            let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
            let p = store.partners().create(partner("Sky Agency")).unwrap();
            let pool = store
                .deposit_pools()
                .create_pool(RecordId::new(), Decimal::from(200), None)
                .unwrap();
            store
                .sync_table(TableName::Partners)
                .acknowledge(&[(p.id(), 1)], Timestamp::from_millis(9))
                .unwrap();
            (p.id(), pool.id())
        };

        let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
        let p = store.partners().get_by_id(partner_id, false).unwrap();
        assert_eq!(p.data.name, "Sky Agency");
        assert_eq!(p.sync_status(), SyncStatus::Clean);
        assert_eq!(
            store.deposit_pools().get_by_id(pool_id, false).unwrap().data.amount_remaining,
            Decimal::from(200)
        );
        assert_eq!(store.path(), Some(dir.path()));
    }

    #[test]
    fn directory_is_exclusive() {
        let dir = tempdir().unwrap();
        let _store = Store::open(dir.path(), StoreConfig::default()).unwrap();
        assert!(matches!(
            Store::open(dir.path(), StoreConfig::default()),
            Err(CoreError::DatabaseLocked)
        ));
    }
}

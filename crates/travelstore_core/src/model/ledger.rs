//! Ledger entries and cash register movements.

use crate::error::{CoreResult, ValidationError};
use crate::journal::Journal;
use crate::record::{RecordId, Row};
use crate::table::{Entity, SyncTable, Table};
use crate::types::{TableName, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which balance a ledger entry moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSource {
    /// The contract's deposit pool.
    Deposit,
    /// The contract's stock pool.
    Stock,
    /// The agency cash register.
    CashRegister,
}

impl LedgerSource {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LedgerSource::Deposit => "deposit",
            LedgerSource::Stock => "stock",
            LedgerSource::CashRegister => "cash_register",
        }
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Balance consumed by a settlement.
    Deduction,
    /// Balance given back.
    Refund,
    /// Balance topped up.
    Payment,
}

/// Immutable record of a balance movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Transaction that caused the movement.
    pub transaction_id: Option<RecordId>,
    /// Contract whose pools moved.
    pub contract_id: Option<RecordId>,
    /// Balance that moved.
    pub source: LedgerSource,
    /// Direction.
    pub kind: LedgerKind,
    /// Amount moved.
    pub amount: Decimal,
    /// Free text.
    pub description: Option<String>,
}

impl Entity for LedgerEntry {
    const TABLE: TableName = TableName::LedgerEntries;
    const INDEXED_FIELDS: &'static [&'static str] = &["transaction_id", "contract_id"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        let mut values = Vec::with_capacity(2);
        if let Some(id) = self.transaction_id {
            values.push(("transaction_id", id.to_string()));
        }
        if let Some(id) = self.contract_id {
            values.push(("contract_id", id.to_string()));
        }
        values
    }
}

/// Append-only ledger.
///
/// Entries can be recorded and read but never edited or deleted locally.
#[derive(Debug)]
pub struct LedgerTable {
    table: Table<LedgerEntry>,
}

impl LedgerTable {
    /// Opens the ledger over `journal`.
    pub fn open(journal: Box<dyn Journal>) -> CoreResult<Self> {
        Ok(Self {
            table: Table::open(journal)?,
        })
    }

    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            table: Table::in_memory(),
        }
    }

    /// Records an entry.
    ///
    /// # Errors
    ///
    /// Rejects negative amounts.
    pub fn record(&self, entry: LedgerEntry, author: Option<&str>) -> CoreResult<Row<LedgerEntry>> {
        if entry.amount.is_sign_negative() {
            return Err(ValidationError::InvalidAmount {
                field: "amount",
                value: entry.amount,
            }
            .into());
        }
        self.table.create_with(None, author, entry)
    }

    /// Gets an entry by id.
    pub fn get_by_id(&self, id: RecordId) -> Option<Row<LedgerEntry>> {
        self.table.get_by_id(id, false)
    }

    /// All entries in recording order.
    pub fn get_all(&self) -> Vec<Row<LedgerEntry>> {
        self.table.get_all(false)
    }

    /// Entries caused by a transaction.
    pub fn for_transaction(&self, transaction_id: RecordId) -> CoreResult<Vec<Row<LedgerEntry>>> {
        self.table
            .find_by_field("transaction_id", &transaction_id.to_string(), false)
    }

    /// Entries against a contract.
    pub fn for_contract(&self, contract_id: RecordId) -> CoreResult<Vec<Row<LedgerEntry>>> {
        self.table
            .find_by_field("contract_id", &contract_id.to_string(), false)
    }

    /// Replication view of the ledger.
    pub fn as_sync(&self) -> &dyn SyncTable {
        &self.table
    }
}

/// Cash movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashDirection {
    /// Money in.
    In,
    /// Money out.
    Out,
}

/// Business origin of a cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashSource {
    /// Payment of a reservation.
    Reservation,
    /// Refund to a client.
    Refund,
    /// Internal expense.
    Expense,
    /// Other service sold.
    Service,
    /// Correction.
    Adjustment,
}

/// A cash register movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlow {
    /// In or out.
    pub direction: CashDirection,
    /// Amount moved.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Business origin.
    pub source: CashSource,
    /// Related record, e.g. a transaction or segment.
    pub reference_id: Option<RecordId>,
    /// Related contract.
    pub contract_id: Option<RecordId>,
    /// Related partner.
    pub partner_id: Option<RecordId>,
    /// Free text.
    pub description: Option<String>,
    /// When the movement happened.
    pub operation_date: Timestamp,
}

impl Entity for CashFlow {
    const TABLE: TableName = TableName::CashFlows;
    const INDEXED_FIELDS: &'static [&'static str] = &["reference_id", "contract_id", "partner_id"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        [
            ("reference_id", self.reference_id),
            ("contract_id", self.contract_id),
            ("partner_id", self.partner_id),
        ]
        .into_iter()
        .filter_map(|(field, id)| id.map(|id| (field, id.to_string())))
        .collect()
    }
}

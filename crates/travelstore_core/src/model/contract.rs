//! Partner contracts.

use super::ledger::LedgerSource;
use crate::error::CoreResult;
use crate::journal::Journal;
use crate::record::{RecordId, Row};
use crate::table::{Entity, Table};
use crate::types::{TableName, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// How a contract's operations are financed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    /// Operations draw on the deposit pool.
    DepositOnly,
    /// Operations draw on the stock pool.
    DepositAndStock,
    /// The agency only sells services; nothing is drawn.
    ServiceOnly,
}

impl ContractType {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ContractType::DepositOnly => "deposit_only",
            ContractType::DepositAndStock => "deposit_and_stock",
            ContractType::ServiceOnly => "service_only",
        }
    }

    /// The pool settlements of this contract type draw on, if any.
    #[must_use]
    pub const fn pool_source(self) -> Option<LedgerSource> {
        match self {
            ContractType::DepositOnly => Some(LedgerSource::Deposit),
            ContractType::DepositAndStock => Some(LedgerSource::Stock),
            ContractType::ServiceOnly => None,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// In force.
    Active,
    /// Suspended.
    Inactive,
    /// Past its end date.
    Expired,
    /// Pools used up.
    Exhausted,
}

impl ContractStatus {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Inactive => "inactive",
            ContractStatus::Expired => "expired",
            ContractStatus::Exhausted => "exhausted",
        }
    }
}

/// A contract between the agency and a partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Owning partner.
    pub partner_id: RecordId,
    /// Financing mode.
    pub contract_type: ContractType,
    /// Lifecycle state.
    pub status: ContractStatus,
    /// Start of validity.
    pub starts_at: Option<Timestamp>,
    /// End of validity.
    pub ends_at: Option<Timestamp>,
    /// Free text.
    pub description: Option<String>,
}

impl Entity for Contract {
    const TABLE: TableName = TableName::Contracts;
    const INDEXED_FIELDS: &'static [&'static str] = &["partner_id", "status"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("partner_id", self.partner_id.to_string()),
            ("status", self.status.as_str().to_string()),
        ]
    }
}

/// The contracts table.
#[derive(Debug)]
pub struct ContractTable {
    table: Table<Contract>,
}

impl ContractTable {
    /// Opens the table over `journal`.
    pub fn open(journal: Box<dyn Journal>) -> CoreResult<Self> {
        Ok(Self {
            table: Table::open(journal)?,
        })
    }

    /// Creates an empty in-memory table.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            table: Table::in_memory(),
        }
    }

    /// Live contracts of a partner, in creation order.
    pub fn by_partner(&self, partner_id: RecordId) -> CoreResult<Vec<Row<Contract>>> {
        self.table
            .find_by_field("partner_id", &partner_id.to_string(), false)
    }

    /// The partner's active contract.
    ///
    /// If several are active, the earliest created wins.
    pub fn active_for_partner(&self, partner_id: RecordId) -> CoreResult<Option<Row<Contract>>> {
        Ok(self
            .by_partner(partner_id)?
            .into_iter()
            .find(|row| row.data.status == ContractStatus::Active))
    }

    /// All live active contracts.
    pub fn active(&self) -> CoreResult<Vec<Row<Contract>>> {
        self.table
            .find_by_field("status", ContractStatus::Active.as_str(), false)
    }
}

impl Deref for ContractTable {
    type Target = Table<Contract>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

//! Basic types used throughout Travelstore.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Creates a timestamp from milliseconds since the epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    /// Returns milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns a timestamp `millis` later than this one.
    #[must_use]
    pub const fn plus_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// The fixed set of record tables kept by the store.
///
/// Every table is replicated independently; there is no cross-table
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    /// Back-office users.
    Users,
    /// Reservation systems (GDS).
    Systems,
    /// Services sold by the agency.
    Services,
    /// Airlines.
    Airlines,
    /// Business partners.
    Partners,
    /// Itineraries and destinations.
    Itineraries,
    /// Partner contracts.
    Contracts,
    /// Deposit (caution) pools.
    DepositPools,
    /// Stock pools.
    StockPools,
    /// Ledger entries produced by settlements.
    LedgerEntries,
    /// Cash register movements.
    CashFlows,
    /// Ticketed transactions.
    Transactions,
    /// Other-service transactions.
    OtherTransactions,
    /// Transaction line segments.
    Segments,
    /// Audit trail.
    AuditLogs,
    /// Change and conflict log.
    ChangeLogs,
}

impl TableName {
    /// Every table, in replication order.
    pub const ALL: [TableName; 16] = [
        TableName::Users,
        TableName::Systems,
        TableName::Services,
        TableName::Airlines,
        TableName::Partners,
        TableName::Itineraries,
        TableName::Contracts,
        TableName::DepositPools,
        TableName::StockPools,
        TableName::LedgerEntries,
        TableName::CashFlows,
        TableName::Transactions,
        TableName::OtherTransactions,
        TableName::Segments,
        TableName::AuditLogs,
        TableName::ChangeLogs,
    ];

    /// Returns the persisted table name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TableName::Users => "users",
            TableName::Systems => "systems",
            TableName::Services => "services",
            TableName::Airlines => "airlines",
            TableName::Partners => "partners",
            TableName::Itineraries => "itineraries",
            TableName::Contracts => "contracts",
            TableName::DepositPools => "deposit_pools",
            TableName::StockPools => "stock_pools",
            TableName::LedgerEntries => "ledger_entries",
            TableName::CashFlows => "cash_flows",
            TableName::Transactions => "transactions",
            TableName::OtherTransactions => "other_transactions",
            TableName::Segments => "segments",
            TableName::AuditLogs => "audit_logs",
            TableName::ChangeLogs => "change_logs",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableName::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown table: {s}"))
    }
}

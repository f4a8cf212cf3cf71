//! Deposit and stock pools.
//!
//! A contract holds zero or more pool rows of each kind. Settlements draw
//! on them in creation order through a two-phase deduction:
//!
//! 1. [`PoolTable::plan_deduction`] walks a snapshot of the contract's rows
//!    and either returns a complete [`DeductionPlan`] or fails with the
//!    shortfall, touching nothing.
//! 2. [`PoolTable::apply`] re-checks every step against current balances
//!    and only then writes the rows.
//!
//! Callers that settle concurrently against the same contract must hold
//! that contract's lock (see [`crate::ContractLocks`]) across both phases.
//!
//! ## Invariant
//!
//! `0 <= amount_remaining <= amount_initial` for every pool row.

use super::ledger::LedgerSource;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::journal::Journal;
use crate::record::{RecordId, Row};
use crate::table::{Entity, Table};
use crate::types::TableName;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

/// Marker for a pool kind.
pub trait PoolKind: fmt::Debug + Clone + Copy + PartialEq + Eq + Default + Send + Sync + 'static {
    /// Table holding rows of this kind.
    const TABLE: TableName;
    /// Name used in errors and logs.
    const NAME: &'static str;
    /// Ledger source recorded for deductions.
    const SOURCE: LedgerSource;
}

/// Deposit (caution) pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deposit;

impl PoolKind for Deposit {
    const TABLE: TableName = TableName::DepositPools;
    const NAME: &'static str = "deposit";
    const SOURCE: LedgerSource = LedgerSource::Deposit;
}

/// Prepaid stock pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stock;

impl PoolKind for Stock {
    const TABLE: TableName = TableName::StockPools;
    const NAME: &'static str = "stock";
    const SOURCE: LedgerSource = LedgerSource::Stock;
}

/// A balance tied to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PoolRow<K: PoolKind> {
    /// Owning contract.
    pub contract_id: RecordId,
    /// Amount originally credited.
    pub amount_initial: Decimal,
    /// Amount still available.
    pub amount_remaining: Decimal,
    #[serde(skip)]
    kind: PhantomData<K>,
}

/// A deposit pool row.
pub type DepositPool = PoolRow<Deposit>;
/// A stock pool row.
pub type StockPool = PoolRow<Stock>;

impl<K: PoolKind> PoolRow<K> {
    /// A full pool of `amount`.
    #[must_use]
    pub fn new(contract_id: RecordId, amount: Decimal) -> Self {
        Self {
            contract_id,
            amount_initial: amount,
            amount_remaining: amount,
            kind: PhantomData,
        }
    }

    /// Returns true if `0 <= amount_remaining <= amount_initial`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.amount_remaining >= Decimal::ZERO && self.amount_remaining <= self.amount_initial
    }
}

impl<K: PoolKind> Entity for PoolRow<K> {
    const TABLE: TableName = K::TABLE;
    const INDEXED_FIELDS: &'static [&'static str] = &["contract_id"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![("contract_id", self.contract_id.to_string())]
    }
}

/// One pool row's share of a deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionStep {
    /// Pool row drawn.
    pub pool_id: RecordId,
    /// Balance seen when planning.
    pub available: Decimal,
    /// Amount drawn.
    pub amount: Decimal,
}

/// A complete deduction against one contract's pools of kind `K`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionPlan<K: PoolKind> {
    /// Contract drawn.
    pub contract_id: RecordId,
    /// Amount covered by the steps.
    pub amount: Decimal,
    /// Rows drawn, in order.
    pub steps: Vec<DeductionStep>,
    kind: PhantomData<K>,
}

impl<K: PoolKind> DeductionPlan<K> {
    /// Ledger source for this plan.
    #[must_use]
    pub const fn source(&self) -> LedgerSource {
        K::SOURCE
    }

    /// Returns true if nothing needs drawing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A pool table of kind `K`.
#[derive(Debug)]
pub struct PoolTable<K: PoolKind> {
    table: Table<PoolRow<K>>,
}

/// The deposit pools table.
pub type DepositPoolTable = PoolTable<Deposit>;
/// The stock pools table.
pub type StockPoolTable = PoolTable<Stock>;

impl<K: PoolKind> PoolTable<K> {
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

    /// Credits a new pool row to a contract.
    ///
    /// # Errors
    ///
    /// Rejects negative amounts.
    pub fn create_pool(
        &self,
        contract_id: RecordId,
        amount: Decimal,
        author: Option<&str>,
    ) -> CoreResult<Row<PoolRow<K>>> {
        if amount < Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                field: "amount_initial",
                value: amount,
            }
            .into());
        }
        self.table
            .create_with(None, author, PoolRow::new(contract_id, amount))
    }

    /// Live rows of a contract in drawing order.
    ///
    /// Ordered by creation time, then by local insertion order.
    pub fn rows_for_contract(&self, contract_id: RecordId) -> CoreResult<Vec<Row<PoolRow<K>>>> {
        let mut rows = self
            .table
            .find_by_field("contract_id", &contract_id.to_string(), false)?;
        rows.sort_by_key(|row| row.meta.created_at);
        Ok(rows)
    }

    /// Live rows of a contract with a positive balance.
    pub fn with_balance(&self, contract_id: RecordId) -> CoreResult<Vec<Row<PoolRow<K>>>> {
        Ok(self
            .rows_for_contract(contract_id)?
            .into_iter()
            .filter(|row| row.data.amount_remaining > Decimal::ZERO)
            .collect())
    }

    /// Sum of remaining balances for a contract.
    pub fn total_remaining(&self, contract_id: RecordId) -> CoreResult<Decimal> {
        Ok(self
            .rows_for_contract(contract_id)?
            .iter()
            .map(|row| row.data.amount_remaining)
            .sum())
    }

    /// Plans drawing `amount` from a contract's rows.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` with the uncovered amount if the rows
    /// cannot cover `amount`, or `InvalidAmount` if it is negative.
    pub fn plan_deduction(&self, contract_id: RecordId, amount: Decimal) -> CoreResult<DeductionPlan<K>> {
        if amount < Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                field: "amount",
                value: amount,
            }
            .into());
        }

        let mut outstanding = amount;
        let mut steps = Vec::new();
        for row in self.rows_for_contract(contract_id)? {
            if outstanding <= Decimal::ZERO {
                break;
            }
            let available = row.data.amount_remaining;
            if available <= Decimal::ZERO {
                continue;
            }
            let take = available.min(outstanding);
            steps.push(DeductionStep {
                pool_id: row.id(),
                available,
                amount: take,
            });
            outstanding -= take;
        }

        if outstanding > Decimal::ZERO {
            return Err(CoreError::InsufficientBalance {
                pool: K::NAME,
                contract_id,
                shortfall: outstanding,
            });
        }

        Ok(DeductionPlan {
            contract_id,
            amount,
            steps,
            kind: PhantomData,
        })
    }

    /// Applies a plan.
    ///
    /// Every step is checked against the current balance before any row is
    /// written; if a row has been drawn since planning, nothing is applied.
    pub fn apply(&self, plan: &DeductionPlan<K>, author: Option<&str>) -> CoreResult<Vec<Row<PoolRow<K>>>> {
        for step in &plan.steps {
            let current = self
                .table
                .get_by_id(step.pool_id, false)
                .map_or(Decimal::ZERO, |row| row.data.amount_remaining);
            if current < step.amount {
                return Err(CoreError::InsufficientBalance {
                    pool: K::NAME,
                    contract_id: plan.contract_id,
                    shortfall: step.amount - current,
                });
            }
        }

        let mut touched = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let updated = self.table.update_as(step.pool_id, author, |pool| {
                pool.amount_remaining -= step.amount;
            })?;
            if let Some(row) = updated {
                touched.push(row);
            }
        }

        tracing::debug!(
            pool = K::NAME,
            contract_id = %plan.contract_id,
            amount = %plan.amount,
            rows = touched.len(),
            "pool deduction applied"
        );
        Ok(touched)
    }

    /// Plans and applies a deduction in one call.
    pub fn deduct(&self, contract_id: RecordId, amount: Decimal, author: Option<&str>) -> CoreResult<DeductionPlan<K>> {
        let plan = self.plan_deduction(contract_id, amount)?;
        self.apply(&plan, author)?;
        Ok(plan)
    }

    /// Rows violating the pool invariant.
    pub fn inconsistent_rows(&self) -> Vec<Row<PoolRow<K>>> {
        self.table.find(true, |row| !row.data.is_consistent())
    }
}

impl<K: PoolKind> Deref for PoolTable<K> {
    type Target = Table<PoolRow<K>>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

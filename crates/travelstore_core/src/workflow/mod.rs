//! Settlement of pending transactions.
//!
//! ```text
//!            validate
//! pending ─────────────► validated   (pool deduction + ledger entry)
//!    │
//!    └─────────────────► cancelled   (no deduction)
//!            cancel
//! ```
//!
//! Both targets are terminal. Every precondition, including pool
//! sufficiency for the whole transaction, is checked before anything is
//! written, so a failed validation leaves the store untouched.

mod locks;

pub use locks::ContractLocks;

use crate::error::{CoreResult, ValidationError};
use crate::model::{
    AuditLog, Deposit, DeductionPlan, LedgerEntry, LedgerKind, LedgerSource,
    NewOtherTransaction, NewTransaction, OtherTransaction, Role, Segment, Stock, Transaction,
    TransactionStatus, User,
};
use crate::record::{RecordId, Row};
use crate::store::Store;
use crate::types::{TableName, Timestamp};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User id.
    pub user_id: RecordId,
    /// User role.
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(user_id: RecordId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// The actor for a stored user.
    #[must_use]
    pub fn from_user(user: &Row<User>) -> Self {
        Self::new(user.id(), user.data.role)
    }

    fn author(&self) -> String {
        self.user_id.to_string()
    }

    fn require(&self, allowed: bool, action: &'static str) -> Result<(), ValidationError> {
        if allowed {
            Ok(())
        } else {
            Err(ValidationError::Unauthorized {
                role: self.role.to_string(),
                action,
            })
        }
    }
}

/// What to settle.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// A ticketed transaction drawn against a contract.
    Ticketed {
        /// Transaction to validate.
        transaction_id: RecordId,
        /// Segments to settle; all of the transaction's segments if `None`
        /// or empty.
        segments: Option<Vec<Row<Segment>>>,
    },
    /// An other-service sale. No contract, pool or ledger is involved.
    OtherService {
        /// Transaction to validate.
        transaction_id: RecordId,
    },
}

/// A transaction to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRef {
    /// A ticketed transaction.
    Ticketed(RecordId),
    /// An other-service transaction.
    OtherService(RecordId),
}

/// Outcome of a ticketed validation.
#[derive(Debug, Clone)]
pub struct TicketedSettlement {
    /// The validated transaction.
    pub transaction: Row<Transaction>,
    /// The settled segments.
    pub segments: Vec<Row<Segment>>,
    /// Amount drawn from the contract's pools.
    pub deducted: Decimal,
    /// The ledger entry, unless the contract is service-only.
    pub ledger_entry: Option<Row<LedgerEntry>>,
}

/// Outcome of [`SettlementService::validate`].
#[derive(Debug, Clone)]
pub enum Settled {
    /// A ticketed transaction was validated.
    Ticketed(TicketedSettlement),
    /// An other-service transaction was validated.
    OtherService(Row<OtherTransaction>),
}

enum PoolDraw {
    Deposit(DeductionPlan<Deposit>),
    Stock(DeductionPlan<Stock>),
    Nothing,
}

impl PoolDraw {
    fn source(&self) -> Option<LedgerSource> {
        match self {
            PoolDraw::Deposit(plan) => Some(plan.source()),
            PoolDraw::Stock(plan) => Some(plan.source()),
            PoolDraw::Nothing => None,
        }
    }
}

/// Creates, validates and cancels transactions.
#[derive(Debug)]
pub struct SettlementService {
    store: Arc<Store>,
}

impl SettlementService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Records a new pending ticketed transaction.
    pub fn create_transaction(&self, actor: &Actor, input: NewTransaction) -> CoreResult<Row<Transaction>> {
        actor.require(actor.role.can_edit_operations(), "create transactions")?;
        let transaction = input.into_pending()?;
        self.store
            .transactions()
            .create_with(None, Some(&actor.author()), transaction)
    }

    /// Records a new pending other-service transaction.
    pub fn create_other_transaction(
        &self,
        actor: &Actor,
        input: NewOtherTransaction,
    ) -> CoreResult<Row<OtherTransaction>> {
        actor.require(actor.role.can_edit_operations(), "create transactions")?;
        let transaction = input.into_pending()?;
        self.store
            .other_transactions()
            .create_with(None, Some(&actor.author()), transaction)
    }

    /// Adds a segment to a pending transaction.
    pub fn add_segment(&self, actor: &Actor, segment: Segment) -> CoreResult<Row<Segment>> {
        actor.require(actor.role.can_edit_operations(), "edit segments")?;
        let transaction_id = segment.transaction_id;
        let transaction = self
            .store
            .transactions()
            .get_by_id(transaction_id, false)
            .ok_or(ValidationError::TransactionNotFound(transaction_id))?;
        if transaction.data.status != TransactionStatus::Pending {
            return Err(ValidationError::NotPending(transaction_id).into());
        }
        self.store.segments().add(segment, Some(&actor.author()))
    }

    /// Validates a transaction.
    pub fn validate(&self, actor: &Actor, settlement: Settlement) -> CoreResult<Settled> {
        match settlement {
            Settlement::Ticketed {
                transaction_id,
                segments,
            } => self
                .validate_transaction(actor, transaction_id, segments)
                .map(Settled::Ticketed),
            Settlement::OtherService { transaction_id } => self
                .validate_other_transaction(actor, transaction_id)
                .map(Settled::OtherService),
        }
    }

    /// Validates a ticketed transaction, drawing its segments' sold debit
    /// from the pool selected by the partner's active contract.
    ///
    /// The settlement holds the contract's lock throughout.
    ///
    /// # Errors
    ///
    /// - `Validation` if the actor lacks the manager or admin role, the
    ///   transaction is missing, lacks a partner or contract, is not
    ///   pending, the partner has no active contract, there are no
    ///   segments, or a supplied segment belongs elsewhere
    /// - `InsufficientBalance` if the pools cannot cover the total
    ///
    /// Nothing is written when an error is returned.
    pub fn validate_transaction(
        &self,
        actor: &Actor,
        transaction_id: RecordId,
        segments: Option<Vec<Row<Segment>>>,
    ) -> CoreResult<TicketedSettlement> {
        actor.require(actor.role.can_manage_operations(), "validate transactions")?;

        let contract_id = self
            .contract_of(transaction_id)?
            .ok_or(ValidationError::MissingContract(transaction_id))?;
        let lock = self.store.contract_locks().handle(contract_id);
        let _guard = lock.lock();

        let transaction = self
            .store
            .transactions()
            .get_by_id(transaction_id, false)
            .ok_or(ValidationError::TransactionNotFound(transaction_id))?;
        let partner_id = transaction
            .data
            .partner_id
            .ok_or(ValidationError::MissingPartner(transaction_id))?;
        transaction.data.status.ensure_pending(transaction_id)?;

        let contract = self
            .store
            .contracts()
            .active_for_partner(partner_id)?
            .ok_or(ValidationError::NoActiveContract(partner_id))?;
        let contract_type = contract.data.contract_type;

        let segments = self.resolve_segments(transaction_id, segments)?;
        let total: Decimal = segments
            .iter()
            .map(|(_, segment)| segment.sold_debit)
            .filter(|debit| *debit > Decimal::ZERO)
            .sum();

        let draw = match contract_type.pool_source() {
            Some(LedgerSource::Deposit) => {
                PoolDraw::Deposit(self.store.deposit_pools().plan_deduction(contract_id, total)?)
            }
            Some(LedgerSource::Stock) => {
                PoolDraw::Stock(self.store.stock_pools().plan_deduction(contract_id, total)?)
            }
            Some(LedgerSource::CashRegister) | None => PoolDraw::Nothing,
        };

        let author = actor.author();
        let author = Some(author.as_str());
        match &draw {
            PoolDraw::Deposit(plan) => {
                self.store.deposit_pools().apply(plan, author)?;
            }
            PoolDraw::Stock(plan) => {
                self.store.stock_pools().apply(plan, author)?;
            }
            PoolDraw::Nothing => {}
        }

        let mut settled = Vec::with_capacity(segments.len());
        for (id, data) in segments {
            if let Some(row) = self
                .store
                .segments()
                .update_as(id, author, move |segment| *segment = data)?
            {
                settled.push(row);
            }
        }

        let transaction = self
            .store
            .transactions()
            .update_as(transaction_id, author, |t| t.status = TransactionStatus::Validated)?
            .ok_or(ValidationError::TransactionNotFound(transaction_id))?;

        let deducted = if draw.source().is_some() {
            total
        } else {
            Decimal::ZERO
        };
        let ledger_entry = match draw.source() {
            Some(source) => Some(self.store.ledger().record(
                LedgerEntry {
                    transaction_id: Some(transaction_id),
                    contract_id: Some(contract_id),
                    source,
                    kind: LedgerKind::Deduction,
                    amount: transaction.data.total_amount,
                    description: Some(format!(
                        "{} deduction for client {}",
                        contract_type, transaction.data.client_name
                    )),
                },
                author,
            )?),
            None => None,
        };

        self.audit(
            actor,
            TableName::Transactions,
            transaction_id,
            "validate",
            Some(format!("deducted {deducted} ({contract_type})")),
        )?;

        tracing::info!(
            transaction_id = %transaction_id,
            contract_id = %contract_id,
            contract_type = %contract_type,
            deducted = %deducted,
            segments = settled.len(),
            "transaction validated"
        );

        Ok(TicketedSettlement {
            transaction,
            segments: settled,
            deducted,
            ledger_entry,
        })
    }

    /// Validates an other-service transaction.
    pub fn validate_other_transaction(
        &self,
        actor: &Actor,
        transaction_id: RecordId,
    ) -> CoreResult<Row<OtherTransaction>> {
        actor.require(actor.role.can_manage_operations(), "validate transactions")?;

        let transaction = self
            .store
            .other_transactions()
            .try_update_as(transaction_id, Some(&actor.author()), |t| {
                t.status.ensure_pending(transaction_id)?;
                t.status = TransactionStatus::Validated;
                Ok(())
            })?
            .ok_or(ValidationError::TransactionNotFound(transaction_id))?;

        self.audit(actor, TableName::OtherTransactions, transaction_id, "validate", None)?;
        tracing::info!(transaction_id = %transaction_id, "other-service transaction validated");
        Ok(transaction)
    }

    /// Cancels a pending transaction. No pool balance is restored.
    pub fn cancel(&self, actor: &Actor, target: TransactionRef) -> CoreResult<()> {
        actor.require(actor.role.can_manage_operations(), "cancel transactions")?;
        let author = actor.author();

        let cancel = |status: &mut TransactionStatus, id: RecordId| -> CoreResult<()> {
            status.ensure_pending(id)?;
            *status = TransactionStatus::Cancelled;
            Ok(())
        };

        let (table, id) = match target {
            TransactionRef::Ticketed(id) => {
                let lock = self.contract_of(id)?.map(|c| self.store.contract_locks().handle(c));
                let _guard = lock.as_ref().map(|l| l.lock());
                self.store
                    .transactions()
                    .try_update_as(id, Some(&author), |t| cancel(&mut t.status, id))?
                    .ok_or(ValidationError::TransactionNotFound(id))?;
                (TableName::Transactions, id)
            }
            TransactionRef::OtherService(id) => {
                self.store
                    .other_transactions()
                    .try_update_as(id, Some(&author), |t| cancel(&mut t.status, id))?
                    .ok_or(ValidationError::TransactionNotFound(id))?;
                (TableName::OtherTransactions, id)
            }
        };

        self.audit(actor, table, id, "cancel", None)?;
        tracing::info!(table = %table, transaction_id = %id, "transaction cancelled");
        Ok(())
    }

    /// Contract of a live transaction.
    fn contract_of(&self, transaction_id: RecordId) -> CoreResult<Option<RecordId>> {
        self.store
            .transactions()
            .get_by_id(transaction_id, false)
            .map(|t| t.data.contract_id)
            .ok_or_else(|| ValidationError::TransactionNotFound(transaction_id).into())
    }

    /// Supplied segments if any, else the stored ones.
    ///
    /// Supplied segments must already be stored under the transaction;
    /// their derived amounts are recomputed and duplicates dropped.
    fn resolve_segments(
        &self,
        transaction_id: RecordId,
        supplied: Option<Vec<Row<Segment>>>,
    ) -> CoreResult<Vec<(RecordId, Segment)>> {
        let segments = match supplied {
            Some(rows) if !rows.is_empty() => {
                let mut seen = HashSet::new();
                let mut segments = Vec::with_capacity(rows.len());
                for row in rows {
                    let id = row.id();
                    let owned = row.data.transaction_id == transaction_id
                        && self
                            .store
                            .segments()
                            .get_by_id(id, false)
                            .is_some_and(|stored| stored.data.transaction_id == transaction_id);
                    if !owned {
                        return Err(ValidationError::ForeignSegment {
                            segment: id,
                            transaction: transaction_id,
                        }
                        .into());
                    }
                    if !seen.insert(id) {
                        continue;
                    }

                    let mut data = row.data;
                    data.pricing.check()?;
                    let pricing = data.pricing.clone();
                    data.reprice(pricing);
                    segments.push((id, data));
                }
                segments
            }
            _ => self
                .store
                .segments()
                .for_transaction(transaction_id)?
                .into_iter()
                .map(|row| (row.id(), row.data))
                .collect(),
        };

        if segments.is_empty() {
            return Err(ValidationError::NoSegments(transaction_id).into());
        }
        Ok(segments)
    }

    fn audit(
        &self,
        actor: &Actor,
        table: TableName,
        id: RecordId,
        action: &str,
        details: Option<String>,
    ) -> CoreResult<()> {
        let author = actor.author();
        self.store
            .audit_logs()
            .create_with(
                None,
                Some(&author),
                AuditLog {
                    entity_name: table,
                    entity_id: id,
                    action: action.to_string(),
                    user_id: Some(actor.user_id),
                    at: Timestamp::now(),
                    details,
                },
            )
            .map(|_| ())
    }
}

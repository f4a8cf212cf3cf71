//! Ticketed transactions and other-service transactions.

use crate::error::ValidationError;
use crate::record::RecordId;
use crate::table::Entity;
use crate::types::{TableName, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting validation.
    Pending,
    /// Settled.
    Validated,
    /// Abandoned.
    Cancelled,
}

impl TransactionStatus {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Validated => "validated",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Ensures the transaction can still be settled or cancelled.
    pub fn ensure_pending(self, id: RecordId) -> Result<(), ValidationError> {
        match self {
            TransactionStatus::Pending => Ok(()),
            TransactionStatus::Validated => Err(ValidationError::AlreadyValidated(id)),
            TransactionStatus::Cancelled => Err(ValidationError::AlreadyCancelled(id)),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ticketed transaction drawn against a partner contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Partner billed.
    pub partner_id: Option<RecordId>,
    /// Service sold.
    pub service_id: Option<RecordId>,
    /// Contract whose pools are drawn.
    pub contract_id: Option<RecordId>,
    /// Client name.
    pub client_name: String,
    /// When the client asked.
    pub requested_at: Timestamp,
    /// When tickets were issued.
    pub issued_at: Option<Timestamp>,
    /// Total, all taxes included.
    pub total_amount: Decimal,
    /// Total commission.
    pub total_commission: Option<Decimal>,
    /// Total tax.
    pub total_tax: Option<Decimal>,
    /// Receipt number.
    pub receipt_reference: Option<String>,
    /// Free text.
    pub observation: Option<String>,
    /// Settlement state.
    pub status: TransactionStatus,
}

impl Entity for Transaction {
    const TABLE: TableName = TableName::Transactions;
    const INDEXED_FIELDS: &'static [&'static str] = &["partner_id", "contract_id", "status"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        let mut values = vec![("status", self.status.as_str().to_string())];
        if let Some(id) = self.partner_id {
            values.push(("partner_id", id.to_string()));
        }
        if let Some(id) = self.contract_id {
            values.push(("contract_id", id.to_string()));
        }
        values
    }
}

/// Input for a new ticketed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Partner billed.
    pub partner_id: Option<RecordId>,
    /// Service sold.
    pub service_id: Option<RecordId>,
    /// Contract to draw on.
    pub contract_id: Option<RecordId>,
    /// Client name.
    pub client_name: String,
    /// When the client asked.
    pub requested_at: Timestamp,
    /// When tickets were issued.
    pub issued_at: Option<Timestamp>,
    /// Total, all taxes included.
    pub total_amount: Decimal,
    /// Total commission.
    pub total_commission: Option<Decimal>,
    /// Total tax.
    pub total_tax: Option<Decimal>,
    /// Receipt number.
    pub receipt_reference: Option<String>,
    /// Free text.
    pub observation: Option<String>,
}

impl NewTransaction {
    /// Checks creation rules and builds a pending transaction.
    ///
    /// Partner, contract, service and a non-blank client name are
    /// required, and the total must be positive.
    pub fn into_pending(self) -> Result<Transaction, ValidationError> {
        if self.partner_id.is_none() {
            return Err(ValidationError::RequiredField("partner_id"));
        }
        if self.contract_id.is_none() {
            return Err(ValidationError::RequiredField("contract_id"));
        }
        if self.service_id.is_none() {
            return Err(ValidationError::RequiredField("service_id"));
        }
        if self.client_name.trim().is_empty() {
            return Err(ValidationError::RequiredField("client_name"));
        }
        if self.total_amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                field: "total_amount",
                value: self.total_amount,
            });
        }

        Ok(Transaction {
            partner_id: self.partner_id,
            service_id: self.service_id,
            contract_id: self.contract_id,
            client_name: self.client_name.trim().to_string(),
            requested_at: self.requested_at,
            issued_at: self.issued_at,
            total_amount: self.total_amount,
            total_commission: self.total_commission,
            total_tax: self.total_tax,
            receipt_reference: self.receipt_reference,
            observation: self.observation,
            status: TransactionStatus::Pending,
        })
    }
}

/// A non-ticketed service sale, settled from the cash register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherTransaction {
    /// Service sold.
    pub service_id: Option<RecordId>,
    /// Client name.
    pub client_name: String,
    /// When the client asked.
    pub requested_at: Timestamp,
    /// When the service was delivered.
    pub issued_at: Option<Timestamp>,
    /// Total, all taxes included.
    pub total_amount: Option<Decimal>,
    /// Agency fee.
    pub service_fee: Decimal,
    /// Free text.
    pub observation: Option<String>,
    /// Settlement state.
    pub status: TransactionStatus,
}

impl Entity for OtherTransaction {
    const TABLE: TableName = TableName::OtherTransactions;
    const INDEXED_FIELDS: &'static [&'static str] = &["service_id", "status"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        let mut values = vec![("status", self.status.as_str().to_string())];
        if let Some(id) = self.service_id {
            values.push(("service_id", id.to_string()));
        }
        values
    }
}

/// Input for a new other-service transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOtherTransaction {
    /// Service sold.
    pub service_id: Option<RecordId>,
    /// Client name.
    pub client_name: String,
    /// When the client asked.
    pub requested_at: Timestamp,
    /// Total, all taxes included.
    pub total_amount: Option<Decimal>,
    /// Agency fee.
    pub service_fee: Decimal,
    /// Free text.
    pub observation: Option<String>,
}

impl NewOtherTransaction {
    /// Checks creation rules and builds a pending transaction.
    pub fn into_pending(self) -> Result<OtherTransaction, ValidationError> {
        if self.client_name.trim().is_empty() {
            return Err(ValidationError::RequiredField("client_name"));
        }
        if self.service_fee <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                field: "service_fee",
                value: self.service_fee,
            });
        }

        Ok(OtherTransaction {
            service_id: self.service_id,
            client_name: self.client_name.trim().to_string(),
            requested_at: self.requested_at,
            issued_at: None,
            total_amount: self.total_amount,
            service_fee: self.service_fee,
            observation: self.observation,
            status: TransactionStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_transaction() -> NewTransaction {
        NewTransaction {
            partner_id: Some(RecordId::new()),
            service_id: Some(RecordId::new()),
            contract_id: Some(RecordId::new()),
            client_name: "  Mwamba  ".into(),
            requested_at: Timestamp::from_millis(1),
            issued_at: None,
            total_amount: Decimal::from(135),
            total_commission: None,
            total_tax: None,
            receipt_reference: None,
            observation: None,
        }
    }

    #[test]
    fn new_transactions_start_pending() {
        let tx = new_transaction().into_pending().unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.client_name, "Mwamba");
    }

    #[test]
    fn creation_rules() {
        let mut input = new_transaction();
        input.contract_id = None;
        assert_eq!(
            input.into_pending(),
            Err(ValidationError::RequiredField("contract_id"))
        );

        let mut input = new_transaction();
        input.client_name = "   ".into();
        assert_eq!(
            input.into_pending(),
            Err(ValidationError::RequiredField("client_name"))
        );

        let mut input = new_transaction();
        input.total_amount = Decimal::ZERO;
        assert!(matches!(
            input.into_pending(),
            Err(ValidationError::InvalidAmount { field: "total_amount", .. })
        ));
    }

    #[test]
    fn other_service_needs_a_fee() {
        let input = NewOtherTransaction {
            service_id: None,
            client_name: "Ilunga".into(),
            requested_at: Timestamp::from_millis(1),
            total_amount: None,
            service_fee: Decimal::ZERO,
            observation: None,
        };
        assert!(input.into_pending().is_err());
    }

    #[test]
    fn ensure_pending_reports_terminal_state() {
        let id = RecordId::new();
        assert!(TransactionStatus::Pending.ensure_pending(id).is_ok());
        assert_eq!(
            TransactionStatus::Validated.ensure_pending(id),
            Err(ValidationError::AlreadyValidated(id))
        );
        assert_eq!(
            TransactionStatus::Cancelled.ensure_pending(id),
            Err(ValidationError::AlreadyCancelled(id))
        );
    }
}

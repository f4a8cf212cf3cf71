//! Error types for Travelstore core.

use crate::record::RecordId;
use rust_decimal::Decimal;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Travelstore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CBOR encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A journal frame is corrupted.
    #[error("journal corruption at offset {offset}: {message}")]
    JournalCorruption {
        /// Byte offset of the bad frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The store directory is already open in another process.
    #[error("store locked: another process has exclusive access")]
    DatabaseLocked,

    /// Invalid store layout.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A record with this id already exists.
    #[error("duplicate record id {id} in table {table}")]
    DuplicateId {
        /// Table name.
        table: &'static str,
        /// The conflicting id.
        id: RecordId,
    },

    /// Lookup on a field that the table does not index.
    #[error("field {field} is not indexed on table {table}")]
    UnindexedField {
        /// Table name.
        table: &'static str,
        /// Requested field.
        field: String,
    },

    /// A business precondition was not met.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A pool deduction could not be covered.
    #[error("insufficient {pool} balance on contract {contract_id}: short by {shortfall}")]
    InsufficientBalance {
        /// Pool kind ("deposit" or "stock").
        pool: &'static str,
        /// The contract whose pools were drawn.
        contract_id: RecordId,
        /// Amount that could not be covered.
        shortfall: Decimal,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns the shortfall if this is an insufficient balance error.
    #[must_use]
    pub fn shortfall(&self) -> Option<Decimal> {
        match self {
            Self::InsufficientBalance { shortfall, .. } => Some(*shortfall),
            _ => None,
        }
    }
}

/// Business precondition failures raised by the settlement workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The caller's role may not perform this action.
    #[error("role {role} is not allowed to {action}")]
    Unauthorized {
        /// Caller role.
        role: String,
        /// Attempted action.
        action: &'static str,
    },

    /// The transaction has no partner.
    #[error("transaction {0} has no partner")]
    MissingPartner(RecordId),

    /// The transaction has no contract.
    #[error("transaction {0} has no contract")]
    MissingContract(RecordId),

    /// The partner has no active contract.
    #[error("partner {0} has no active contract")]
    NoActiveContract(RecordId),

    /// Nothing to settle.
    #[error("transaction {0} has no segments")]
    NoSegments(RecordId),

    /// A supplied segment belongs to another transaction or does not exist.
    #[error("segment {segment} does not belong to transaction {transaction}")]
    ForeignSegment {
        /// The segment id.
        segment: RecordId,
        /// The transaction being settled.
        transaction: RecordId,
    },

    /// The transaction was already validated.
    #[error("transaction {0} is already validated")]
    AlreadyValidated(RecordId),

    /// The transaction was already cancelled.
    #[error("transaction {0} is already cancelled")]
    AlreadyCancelled(RecordId),

    /// The transaction is no longer pending.
    #[error("transaction {0} is not pending")]
    NotPending(RecordId),

    /// The transaction does not exist.
    #[error("transaction {0} not found")]
    TransactionNotFound(RecordId),

    /// A required field is missing or empty.
    #[error("{0} is required")]
    RequiredField(&'static str),

    /// An amount is out of range.
    #[error("invalid amount for {field}: {value}")]
    InvalidAmount {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: Decimal,
    },
}

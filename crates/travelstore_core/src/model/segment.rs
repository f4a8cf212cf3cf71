//! Transaction segments and their pricing.

use crate::error::{CoreResult, ValidationError};
use crate::journal::Journal;
use crate::record::{RecordId, Row};
use crate::table::{Entity, Table};
use crate::types::TableName;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Price inputs of a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPricing {
    /// Fare before tax.
    pub base_fare: Decimal,
    /// Taxes.
    pub tax: Decimal,
    /// Ancillary costs.
    pub related_costs: Decimal,
    /// Agency fee.
    pub service_fee: Decimal,
    /// Commission earned by the agency.
    pub commission: Decimal,
    /// Paid by the client so far.
    pub amount_received: Decimal,
}

/// Amounts derived from [`SegmentPricing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAmounts {
    /// All taxes included: base + tax + related costs + service fee.
    pub ttc: Decimal,
    /// Owed by the client: ttc - amount received.
    pub remaining_amount: Decimal,
    /// Drawn from the pool on settlement: ttc - commission.
    pub sold_debit: Decimal,
}

impl SegmentPricing {
    /// Computes the derived amounts.
    #[must_use]
    pub fn derive(&self) -> DerivedAmounts {
        let ttc = self.base_fare + self.tax + self.related_costs + self.service_fee;
        DerivedAmounts {
            ttc,
            remaining_amount: ttc - self.amount_received,
            sold_debit: ttc - self.commission,
        }
    }

    /// Rejects negative inputs.
    pub fn check(&self) -> Result<(), ValidationError> {
        let fields = [
            ("base_fare", self.base_fare),
            ("tax", self.tax),
            ("related_costs", self.related_costs),
            ("service_fee", self.service_fee),
            ("commission", self.commission),
            ("amount_received", self.amount_received),
        ];
        match fields.into_iter().find(|(_, value)| *value < Decimal::ZERO) {
            Some((field, value)) => Err(ValidationError::InvalidAmount { field, value }),
            None => Ok(()),
        }
    }
}

/// One ticketed line of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Owning transaction.
    pub transaction_id: RecordId,
    /// Carrier.
    pub airline_id: Option<RecordId>,
    /// Reservation system used.
    pub system_id: Option<RecordId>,
    /// Destination.
    pub itinerary_id: Option<RecordId>,
    /// Ticket number.
    pub ticket_number: Option<String>,
    /// Booking reference.
    pub pnr: Option<String>,
    /// Price inputs.
    pub pricing: SegmentPricing,
    /// Amount drawn from the pool on settlement.
    pub sold_debit: Decimal,
    /// Amount still owed by the client.
    pub remaining_amount: Decimal,
    /// Change fee.
    pub update_price: Option<Decimal>,
    /// Cancellation fee.
    pub cancel_price: Option<Decimal>,
}

impl Segment {
    /// A segment with derived amounts computed from `pricing`.
    #[must_use]
    pub fn new(transaction_id: RecordId, pricing: SegmentPricing) -> Self {
        let mut segment = Self {
            transaction_id,
            airline_id: None,
            system_id: None,
            itinerary_id: None,
            ticket_number: None,
            pnr: None,
            pricing: SegmentPricing::default(),
            sold_debit: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            update_price: None,
            cancel_price: None,
        };
        segment.reprice(pricing);
        segment
    }

    /// Replaces the pricing and recomputes derived amounts.
    pub fn reprice(&mut self, pricing: SegmentPricing) {
        let derived = pricing.derive();
        self.sold_debit = derived.sold_debit;
        self.remaining_amount = derived.remaining_amount;
        self.pricing = pricing;
    }
}

impl Entity for Segment {
    const TABLE: TableName = TableName::Segments;
    const INDEXED_FIELDS: &'static [&'static str] = &["transaction_id", "pnr"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        let mut values = vec![("transaction_id", self.transaction_id.to_string())];
        if let Some(pnr) = &self.pnr {
            values.push(("pnr", pnr.clone()));
        }
        values
    }
}

/// The segments table.
#[derive(Debug)]
pub struct SegmentTable {
    table: Table<Segment>,
}

impl SegmentTable {
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

    /// Stores a segment, recomputing its derived amounts.
    pub fn add(&self, mut segment: Segment, author: Option<&str>) -> CoreResult<Row<Segment>> {
        segment.pricing.check()?;
        let pricing = segment.pricing.clone();
        segment.reprice(pricing);
        self.table.create_with(None, author, segment)
    }

    /// Replaces a segment's pricing.
    ///
    /// Returns `None` if the segment is missing or deleted.
    pub fn reprice(
        &self,
        id: RecordId,
        pricing: SegmentPricing,
        author: Option<&str>,
    ) -> CoreResult<Option<Row<Segment>>> {
        pricing.check()?;
        self.table.update_as(id, author, |segment| segment.reprice(pricing))
    }

    /// Live segments of a transaction, in creation order.
    pub fn for_transaction(&self, transaction_id: RecordId) -> CoreResult<Vec<Row<Segment>>> {
        self.table
            .find_by_field("transaction_id", &transaction_id.to_string(), false)
    }
}

impl Deref for SegmentTable {
    type Target = Table<Segment>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

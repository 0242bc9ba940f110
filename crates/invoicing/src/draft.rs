use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use procura_core::{AggregateId, DomainError};
use procura_parties::PartyId;
use procura_payments::PaymentTypeId;

use crate::line::{InvoiceLine, untaxed_amount};

/// Where a generated invoice comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "model", content = "id", rename_all = "snake_case")]
pub enum InvoiceOrigin {
    PurchaseOrder(AggregateId),
}

/// A generated invoice that has not been issued (persisted) yet.
///
/// The untaxed amount is only known once something computed it, hence the
/// `Option`; use [`InvoiceDraft::ensure_untaxed_amount`] to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub origin: InvoiceOrigin,
    pub party_id: Option<PartyId>,
    pub lines: Vec<InvoiceLine>,
    pub payment_type: Option<PaymentTypeId>,
    pub untaxed_amount: Option<Decimal>,
}

impl InvoiceDraft {
    pub fn new(origin: InvoiceOrigin, party_id: Option<PartyId>, lines: Vec<InvoiceLine>) -> Self {
        Self {
            origin,
            party_id,
            lines,
            payment_type: None,
            untaxed_amount: None,
        }
    }

    /// Return the untaxed amount, computing and caching it from the lines if absent.
    pub fn ensure_untaxed_amount(&mut self) -> Result<Decimal, DomainError> {
        if let Some(amount) = self.untaxed_amount {
            return Ok(amount);
        }
        let amount = untaxed_amount(&self.lines)
            .ok_or_else(|| DomainError::validation("untaxed amount is out of range"))?;
        self.untaxed_amount = Some(amount);
        Ok(amount)
    }
}

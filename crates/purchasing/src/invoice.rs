//! Invoice generation from purchase orders.
//!
//! [`GenericInvoiceBuilder`] is the plain purchase → invoice conversion.
//! [`PaymentTypeInvoiceBuilder`] wraps any [`InvoiceBuilder`] and replaces the
//! copied payment type with the one [`resolve_invoice_payment_type`] decides.

use procura_core::DomainError;
use procura_invoicing::{InvoiceDraft, InvoiceLine, InvoiceOrigin, LineType};
use procura_parties::PartyPaymentTypes;
use procura_payments::PaymentTypeRef;

use crate::order::PurchaseOrder;
use crate::payment_type::resolve_invoice_payment_type;

/// Everything an invoice builder reads about the purchase.
///
/// `payment_type` is the order's payment type with its current kind and must
/// name the same payment type as the order; `party_payment_types` are the
/// defaults of the order's party.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseInvoiceSource<'a> {
    pub order: &'a PurchaseOrder,
    pub payment_type: Option<PaymentTypeRef>,
    pub party_payment_types: Option<PartyPaymentTypes>,
}

impl<'a> PurchaseInvoiceSource<'a> {
    pub fn new(order: &'a PurchaseOrder) -> Self {
        Self {
            order,
            payment_type: None,
            party_payment_types: None,
        }
    }

    pub fn with_payment_type(mut self, payment_type: Option<PaymentTypeRef>) -> Self {
        self.payment_type = payment_type;
        self
    }

    pub fn with_party_payment_types(mut self, party_payment_types: Option<PartyPaymentTypes>) -> Self {
        self.party_payment_types = party_payment_types;
        self
    }
}

/// Builds the invoice for a purchase order. `Ok(None)` means there is nothing to invoice.
pub trait InvoiceBuilder {
    fn build_invoice(&self, source: &PurchaseInvoiceSource<'_>) -> Result<Option<InvoiceDraft>, DomainError>;
}

/// Copies the purchase lines, party and payment type onto a new draft.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericInvoiceBuilder;

impl InvoiceBuilder for GenericInvoiceBuilder {
    fn build_invoice(&self, source: &PurchaseInvoiceSource<'_>) -> Result<Option<InvoiceDraft>, DomainError> {
        let order = source.order;
        if !order.lines().iter().any(|l| l.line_type == LineType::Line) {
            return Ok(None);
        }

        let lines = order
            .lines()
            .iter()
            .map(|l| InvoiceLine {
                line_no: l.line_no,
                line_type: l.line_type,
                description: l.description.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();

        let mut draft = InvoiceDraft::new(
            InvoiceOrigin::PurchaseOrder(order.id_typed().0),
            order.party_id(),
            lines,
        );
        draft.payment_type = order.payment_type();
        Ok(Some(draft))
    }
}

/// Decorator deciding the invoice payment type from the untaxed amount sign.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentTypeInvoiceBuilder<B = GenericInvoiceBuilder> {
    inner: B,
}

impl<B: InvoiceBuilder> PaymentTypeInvoiceBuilder<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: InvoiceBuilder> InvoiceBuilder for PaymentTypeInvoiceBuilder<B> {
    fn build_invoice(&self, source: &PurchaseInvoiceSource<'_>) -> Result<Option<InvoiceDraft>, DomainError> {
        let order_payment_type = source.order.payment_type();
        if source.payment_type.map(|pt| pt.id) != order_payment_type {
            return Err(DomainError::validation(format!(
                "payment type snapshot {:?} does not match purchase payment type {:?}",
                source.payment_type.map(|pt| pt.id),
                order_payment_type
            )));
        }

        let Some(mut draft) = self.inner.build_invoice(source)? else {
            return Ok(None);
        };

        // The copied value must not leak into the credit-note direction.
        if order_payment_type.is_some() {
            draft.payment_type = None;
        }

        if let Some(resolved) = resolve_invoice_payment_type(
            source.payment_type.as_ref(),
            source.party_payment_types.as_ref(),
            &mut draft,
        )? {
            draft.payment_type = Some(resolved);
        }
        Ok(Some(draft))
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use procura_core::TenantId;
use procura_events::EventEnvelope;
use procura_invoicing::{InvoiceId, line_amount};
use procura_parties::PartyId;
use procura_payments::PaymentTypeId;
use procura_purchasing::{AGGREGATE_TYPE, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus};

use crate::projections::cursor::{
    Admission, ProjectionError, StreamCursors, decode, ensure_same_stream, replay_order,
};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReadModel {
    pub order_id: PurchaseOrderId,
    pub party_id: Option<PartyId>,
    pub payment_type: Option<PaymentTypeId>,
    pub status: PurchaseOrderStatus,
    pub line_count: usize,
    /// Running sum of `quantity × unit_price` over amount lines.
    pub untaxed_amount: Decimal,
    pub invoices: Vec<InvoiceId>,
}

#[derive(Debug)]
pub struct PurchaseOrdersProjection<S>
where
    S: TenantStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PurchaseOrdersProjection<S>
where
    S: TenantStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, order_id: &PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.store.get(tenant_id, order_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<PurchaseOrderReadModel> {
        self.store.list(tenant_id)
    }

    pub fn list_by_status(&self, tenant_id: TenantId, status: PurchaseOrderStatus) -> Vec<PurchaseOrderReadModel> {
        self.store.list_where(tenant_id, &|rm| rm.status == status)
    }

    /// Purchase orders currently referencing `payment_type`.
    pub fn count_by_payment_type(&self, tenant_id: TenantId, payment_type: PaymentTypeId) -> usize {
        self.store
            .count_where(tenant_id, &|rm| rm.payment_type == Some(payment_type))
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if !envelope.is_for(AGGREGATE_TYPE) {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if self.cursors.admit(tenant_id, aggregate_id, seq)? == Admission::Duplicate {
            return Ok(());
        }

        let ev: PurchaseOrderEvent = decode(envelope)?;
        let (event_tenant, order_id) = ev.tenant_and_id();
        ensure_same_stream(envelope, event_tenant, order_id.0)?;

        match ev {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.order_id,
                    PurchaseOrderReadModel {
                        order_id: e.order_id,
                        party_id: e.party_id,
                        payment_type: e.payment_type,
                        status: PurchaseOrderStatus::Draft,
                        line_count: 0,
                        untaxed_amount: Decimal::ZERO,
                        invoices: vec![],
                    },
                );
            }
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => {
                self.update(tenant_id, e.order_id, |rm| {
                    rm.line_count += 1;
                    let line = &e.line;
                    match line_amount(line.line_type, line.quantity, line.unit_price)
                        .and_then(|amount| rm.untaxed_amount.checked_add(amount))
                    {
                        Some(total) => rm.untaxed_amount = total,
                        None => warn!(order_id = %e.order_id, line_no = line.line_no, "line amount out of range; total left unchanged"),
                    }
                });
            }
            PurchaseOrderEvent::PurchaseOrderPartyChanged(e) => {
                self.update(tenant_id, e.order_id, |rm| {
                    rm.party_id = e.party_id;
                    rm.payment_type = e.payment_type;
                });
            }
            PurchaseOrderEvent::PurchaseOrderPaymentTypeSet(e) => {
                self.update(tenant_id, e.order_id, |rm| rm.payment_type = e.payment_type);
            }
            PurchaseOrderEvent::PurchaseOrderApproved(e) => {
                self.update(tenant_id, e.order_id, |rm| rm.status = PurchaseOrderStatus::Approved);
            }
            PurchaseOrderEvent::PurchaseOrderInvoiced(e) => {
                self.update(tenant_id, e.order_id, |rm| {
                    rm.status = PurchaseOrderStatus::Invoiced;
                    rm.invoices.push(e.invoice_id);
                });
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, order_id: PurchaseOrderId, f: impl FnOnce(&mut PurchaseOrderReadModel)) {
        if let Some(mut rm) = self.store.get(tenant_id, &order_id) {
            f(&mut rm);
            self.store.upsert(tenant_id, order_id, rm);
        }
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        for tenant_id in replay_order(&mut envs) {
            self.store.clear_tenant(tenant_id);
            self.cursors.clear_tenant(tenant_id);
        }
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

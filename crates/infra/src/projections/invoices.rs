use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use procura_core::TenantId;
use procura_events::EventEnvelope;
use procura_invoicing::{AGGREGATE_TYPE, InvoiceEvent, InvoiceId, InvoiceOrigin, InvoiceStatus};
use procura_parties::PartyId;
use procura_payments::PaymentTypeId;

use crate::projections::cursor::{
    Admission, ProjectionError, StreamCursors, decode, ensure_same_stream, replay_order,
};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub origin: InvoiceOrigin,
    pub party_id: Option<PartyId>,
    pub payment_type: Option<PaymentTypeId>,
    pub untaxed_amount: Decimal,
    pub status: InvoiceStatus,
}

impl InvoiceReadModel {
    pub fn is_credit_note(&self) -> bool {
        self.untaxed_amount < Decimal::ZERO
    }
}

#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(tenant_id, invoice_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.store.list(tenant_id)
    }

    pub fn list_for_origin(&self, tenant_id: TenantId, origin: InvoiceOrigin) -> Vec<InvoiceReadModel> {
        self.store.list_where(tenant_id, &|rm| rm.origin == origin)
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

        let ev: InvoiceEvent = decode(envelope)?;
        let (event_tenant, invoice_id) = ev.tenant_and_id();
        ensure_same_stream(envelope, event_tenant, invoice_id.0)?;

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    tenant_id,
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        origin: e.origin,
                        party_id: e.party_id,
                        payment_type: e.payment_type,
                        untaxed_amount: e.untaxed_amount,
                        status: InvoiceStatus::Posted,
                    },
                );
            }
            InvoiceEvent::InvoiceVoided(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.status = InvoiceStatus::Void;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use procura_core::AggregateId;
    use procura_invoicing::{InvoiceIssued, InvoiceVoided};
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    #[test]
    fn issued_then_voided() {
        let projection: InvoicesProjection<InMemoryTenantStore<InvoiceId, InvoiceReadModel>> =
            InvoicesProjection::new(InMemoryTenantStore::new());
        let tenant_id = TenantId::new();
        let invoice_id = InvoiceId::new(AggregateId::new());
        let origin = InvoiceOrigin::PurchaseOrder(AggregateId::new());
        let envelope = |seq: u64, ev: InvoiceEvent| {
            EventEnvelope::new(
                Uuid::now_v7(),
                tenant_id,
                invoice_id.0,
                AGGREGATE_TYPE,
                seq,
                serde_json::to_value(ev).unwrap(),
            )
        };

        projection
            .apply_envelope(&envelope(
                1,
                InvoiceEvent::InvoiceIssued(InvoiceIssued {
                    tenant_id,
                    invoice_id,
                    origin,
                    party_id: None,
                    lines: vec![],
                    payment_type: None,
                    untaxed_amount: Decimal::new(-500, 2),
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        let rm = projection.get(tenant_id, &invoice_id).unwrap();
        assert!(rm.is_credit_note());
        assert_eq!(projection.list_for_origin(tenant_id, origin).len(), 1);

        projection
            .apply_envelope(&envelope(
                2,
                InvoiceEvent::InvoiceVoided(InvoiceVoided {
                    tenant_id,
                    invoice_id,
                    reason: None,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        assert_eq!(projection.get(tenant_id, &invoice_id).unwrap().status, InvoiceStatus::Void);
    }
}

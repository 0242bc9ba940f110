use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use procura_core::TenantId;
use procura_events::EventEnvelope;
use procura_payments::{
    AGGREGATE_TYPE, PaymentKind, PaymentTypeEvent, PaymentTypeId, PaymentTypeRef,
};

use crate::projections::cursor::{
    Admission, ProjectionError, StreamCursors, decode, ensure_same_stream, replay_order,
};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTypeReadModel {
    pub payment_type_id: PaymentTypeId,
    pub name: String,
    pub kind: PaymentKind,
    /// False once the payment type is deleted.
    pub active: bool,
}

impl PaymentTypeReadModel {
    pub fn to_ref(&self) -> PaymentTypeRef {
        PaymentTypeRef::new(self.payment_type_id, self.kind)
    }
}

/// Payment type directory: name and kind of every payment type per tenant.
///
/// Deleted payment types stay in the store with `active = false` so that old
/// documents can still display them; lookups for new documents skip them.
#[derive(Debug)]
pub struct PaymentTypeDirectoryProjection<S>
where
    S: TenantStore<PaymentTypeId, PaymentTypeReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PaymentTypeDirectoryProjection<S>
where
    S: TenantStore<PaymentTypeId, PaymentTypeReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, payment_type_id: &PaymentTypeId) -> Option<PaymentTypeReadModel> {
        self.store.get(tenant_id, payment_type_id)
    }

    /// Live payment type snapshot, `None` if unknown or deleted.
    pub fn active_ref(&self, tenant_id: TenantId, payment_type_id: &PaymentTypeId) -> Option<PaymentTypeRef> {
        self.get(tenant_id, payment_type_id)
            .filter(|rm| rm.active)
            .map(|rm| rm.to_ref())
    }

    /// Active payment types, sorted by name.
    pub fn list_active(&self, tenant_id: TenantId) -> Vec<PaymentTypeReadModel> {
        let mut out = self.store.list_where(tenant_id, &|rm| rm.active);
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Active payment types whose kind covers `kind`.
    pub fn list_covering(&self, tenant_id: TenantId, kind: PaymentKind) -> Vec<PaymentTypeRef> {
        self.list_active(tenant_id)
            .into_iter()
            .filter(|rm| rm.kind.covers(kind))
            .map(|rm| rm.to_ref())
            .collect()
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

        let ev: PaymentTypeEvent = decode(envelope)?;
        let (event_tenant, payment_type_id) = ev.tenant_and_id();
        ensure_same_stream(envelope, event_tenant, payment_type_id.0)?;

        match ev {
            PaymentTypeEvent::PaymentTypeCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.payment_type_id,
                    PaymentTypeReadModel {
                        payment_type_id: e.payment_type_id,
                        name: e.name,
                        kind: e.kind,
                        active: true,
                    },
                );
            }
            PaymentTypeEvent::PaymentTypeUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.payment_type_id) {
                    rm.name = e.name;
                    rm.kind = e.kind;
                    self.store.upsert(tenant_id, e.payment_type_id, rm);
                }
            }
            PaymentTypeEvent::PaymentTypeDeleted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.payment_type_id) {
                    rm.active = false;
                    self.store.upsert(tenant_id, e.payment_type_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    /// Clear the touched tenants and replay `envelopes` in stream order.
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
    use procura_payments::{PaymentTypeCreated, PaymentTypeDeleted, PaymentTypeUpdated};
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    type Projection = PaymentTypeDirectoryProjection<InMemoryTenantStore<PaymentTypeId, PaymentTypeReadModel>>;

    fn envelope(tenant_id: TenantId, id: PaymentTypeId, seq: u64, ev: PaymentTypeEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            id.0,
            AGGREGATE_TYPE,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn created(tenant_id: TenantId, id: PaymentTypeId, name: &str, kind: PaymentKind) -> PaymentTypeEvent {
        PaymentTypeEvent::PaymentTypeCreated(PaymentTypeCreated {
            tenant_id,
            payment_type_id: id,
            name: name.to_string(),
            kind,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn tracks_kind_changes_and_deletion() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let tenant_id = TenantId::new();
        let id = PaymentTypeId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant_id, id, 1, created(tenant_id, id, "Transfer", PaymentKind::Payable)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant_id,
                id,
                2,
                PaymentTypeEvent::PaymentTypeUpdated(PaymentTypeUpdated {
                    tenant_id,
                    payment_type_id: id,
                    name: "Transfer".to_string(),
                    kind: PaymentKind::Both,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        assert_eq!(
            projection.active_ref(tenant_id, &id),
            Some(PaymentTypeRef::new(id, PaymentKind::Both))
        );
        assert_eq!(projection.list_covering(tenant_id, PaymentKind::Receivable).len(), 1);

        projection
            .apply_envelope(&envelope(
                tenant_id,
                id,
                3,
                PaymentTypeEvent::PaymentTypeDeleted(PaymentTypeDeleted {
                    tenant_id,
                    payment_type_id: id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        assert_eq!(projection.active_ref(tenant_id, &id), None);
        assert!(projection.list_active(tenant_id).is_empty());
        assert!(!projection.get(tenant_id, &id).unwrap().active);
    }

    #[test]
    fn replayed_envelope_is_ignored() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let tenant_id = TenantId::new();
        let id = PaymentTypeId::new(AggregateId::new());
        let env = envelope(tenant_id, id, 1, created(tenant_id, id, "Cash", PaymentKind::Both));

        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();
        assert_eq!(projection.list_active(tenant_id).len(), 1);
    }

    #[test]
    fn rejects_payload_from_another_tenant() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let id = PaymentTypeId::new(AggregateId::new());
        let env = envelope(TenantId::new(), id, 1, created(TenantId::new(), id, "Cash", PaymentKind::Both));

        assert!(matches!(
            projection.apply_envelope(&env),
            Err(ProjectionError::TenantIsolation(_))
        ));
    }

    #[test]
    fn rebuild_replays_out_of_order_input() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let tenant_id = TenantId::new();
        let a = PaymentTypeId::new(AggregateId::new());
        let b = PaymentTypeId::new(AggregateId::new());

        projection
            .rebuild_from_scratch(vec![
                envelope(
                    tenant_id,
                    a,
                    2,
                    PaymentTypeEvent::PaymentTypeUpdated(PaymentTypeUpdated {
                        tenant_id,
                        payment_type_id: a,
                        name: "Wire".to_string(),
                        kind: PaymentKind::Payable,
                        occurred_at: Utc::now(),
                    }),
                ),
                envelope(tenant_id, b, 1, created(tenant_id, b, "Cash", PaymentKind::Receivable)),
                envelope(tenant_id, a, 1, created(tenant_id, a, "Transfer", PaymentKind::Payable)),
            ])
            .unwrap();

        let names: Vec<_> = projection.list_active(tenant_id).into_iter().map(|rm| rm.name).collect();
        assert_eq!(names, vec!["Cash".to_string(), "Wire".to_string()]);
    }
}

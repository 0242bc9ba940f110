use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use procura_core::TenantId;
use procura_events::EventEnvelope;
use procura_parties::{
    AGGREGATE_TYPE, PartyEvent, PartyId, PartyKind, PartyPaymentTypes, PartyStatus,
};
use procura_payments::PaymentTypeId;

use crate::projections::cursor::{
    Admission, ProjectionError, StreamCursors, decode, ensure_same_stream, replay_order,
};
use crate::read_model::TenantStore;

/// Party directory entry, including the per-role payment defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyReadModel {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub email: Option<String>,
    pub status: PartyStatus,
    pub payment_types: PartyPaymentTypes,
}

#[derive(Debug)]
pub struct PartyDirectoryProjection<S>
where
    S: TenantStore<PartyId, PartyReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PartyDirectoryProjection<S>
where
    S: TenantStore<PartyId, PartyReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, party_id: &PartyId) -> Option<PartyReadModel> {
        self.store.get(tenant_id, party_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<PartyReadModel> {
        self.store.list(tenant_id)
    }

    /// Case-insensitive name search.
    pub fn search_by_name(&self, tenant_id: TenantId, query: &str) -> Vec<PartyReadModel> {
        let q = query.to_lowercase();
        self.store
            .list_where(tenant_id, &|rm| rm.name.to_lowercase().contains(&q))
    }

    pub fn payment_types(&self, tenant_id: TenantId, party_id: &PartyId) -> Option<PartyPaymentTypes> {
        self.get(tenant_id, party_id).map(|rm| rm.payment_types)
    }

    /// Parties whose supplier default is `payment_type`.
    pub fn count_supplier_default(&self, tenant_id: TenantId, payment_type: PaymentTypeId) -> usize {
        self.store
            .count_where(tenant_id, &|rm| rm.payment_types.supplier == Some(payment_type))
    }

    /// Parties whose customer default is `payment_type`.
    pub fn count_customer_default(&self, tenant_id: TenantId, payment_type: PaymentTypeId) -> usize {
        self.store
            .count_where(tenant_id, &|rm| rm.payment_types.customer == Some(payment_type))
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

        let ev: PartyEvent = decode(envelope)?;
        let (event_tenant, party_id) = ev.tenant_and_id();
        ensure_same_stream(envelope, event_tenant, party_id.0)?;

        match ev {
            PartyEvent::PartyRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.party_id,
                    PartyReadModel {
                        party_id: e.party_id,
                        kind: e.kind,
                        name: e.name,
                        email: e.contact.email,
                        status: PartyStatus::Active,
                        payment_types: PartyPaymentTypes::default(),
                    },
                );
            }
            PartyEvent::PartyUpdated(e) => {
                self.update(tenant_id, e.party_id, |rm| {
                    rm.name = e.name;
                    rm.email = e.contact.email;
                });
            }
            PartyEvent::PartySuspended(e) => {
                self.update(tenant_id, e.party_id, |rm| rm.status = PartyStatus::Suspended);
            }
            PartyEvent::PartyPaymentTypesChanged(e) => {
                self.update(tenant_id, e.party_id, |rm| rm.payment_types = e.payment_types);
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, party_id: PartyId, f: impl FnOnce(&mut PartyReadModel)) {
        if let Some(mut rm) = self.store.get(tenant_id, &party_id) {
            f(&mut rm);
            self.store.upsert(tenant_id, party_id, rm);
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

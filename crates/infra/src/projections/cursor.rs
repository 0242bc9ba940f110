//! Per-stream projection cursors.
//!
//! A cursor is the last sequence number a projection applied for one
//! `(tenant, aggregate)` stream. Envelopes at or below the cursor are
//! duplicates and are skipped, which keeps projections idempotent under
//! at-least-once delivery.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use procura_core::{AggregateId, TenantId};
use procura_events::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: String,
        message: String,
    },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Outcome of checking an envelope against its stream cursor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    Apply,
    Duplicate,
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    cursors: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.cursors
            .read()
            .ok()
            .and_then(|c| c.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0)
    }

    /// Decide whether `seq` is the next event of its stream.
    ///
    /// The first event seen for a stream may carry any positive sequence
    /// number; after that increments must be exactly one.
    pub fn admit(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<Admission, ProjectionError> {
        let last = self.get(tenant_id, aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(Admission::Duplicate);
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(Admission::Apply)
    }

    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert((tenant_id, aggregate_id), seq);
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|(t, _), _| *t != tenant_id);
        }
    }
}

/// Check that a decoded event belongs to the envelope's stream.
pub(crate) fn ensure_same_stream(
    envelope: &EventEnvelope<JsonValue>,
    event_tenant: TenantId,
    event_aggregate: AggregateId,
) -> Result<(), ProjectionError> {
    if event_tenant != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if event_aggregate != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event aggregate id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<T, ProjectionError> {
    envelope.decode().map_err(|e| ProjectionError::Deserialize {
        aggregate_type: envelope.aggregate_type().to_string(),
        message: e.to_string(),
    })
}

/// Sort envelopes into deterministic replay order (tenant, aggregate,
/// sequence) and return the distinct tenants they touch.
pub(crate) fn replay_order(envelopes: &mut [EventEnvelope<JsonValue>]) -> Vec<TenantId> {
    envelopes.sort_by_key(|e| {
        (
            *e.tenant_id().as_uuid().as_bytes(),
            *e.aggregate_id().as_uuid().as_bytes(),
            e.sequence_number(),
        )
    });
    let mut tenants: Vec<TenantId> = envelopes.iter().map(|e| e.tenant_id()).collect();
    tenants.dedup();
    tenants
}

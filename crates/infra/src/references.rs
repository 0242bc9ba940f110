//! Payment type reference protection.
//!
//! Every module that stores payment type ids registers the field holding
//! them together with a counter over its read model. Before a payment type's
//! kind changes or the payment type is deleted, the host asks the guard for
//! the current usages and hands them to the aggregate, which refuses the
//! change while any count is non-zero.

use std::fmt;

use procura_core::TenantId;
use procura_payments::{PaymentTypeId, PaymentTypeUsage, RelatedField};

type UsageCounter = Box<dyn Fn(TenantId, PaymentTypeId) -> usize + Send + Sync>;

#[derive(Default)]
pub struct ReferenceGuard {
    fields: Vec<(RelatedField, UsageCounter)>,
}

impl fmt::Debug for ReferenceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceGuard")
            .field("fields", &self.fields().collect::<Vec<_>>())
            .finish()
    }
}

impl ReferenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a referencing field. Registering the same field twice replaces
    /// its counter.
    pub fn register(
        &mut self,
        field: RelatedField,
        counter: impl Fn(TenantId, PaymentTypeId) -> usize + Send + Sync + 'static,
    ) {
        self.fields.retain(|(f, _)| *f != field);
        self.fields.push((field, Box::new(counter)));
    }

    pub fn fields(&self) -> impl Iterator<Item = &RelatedField> {
        self.fields.iter().map(|(f, _)| f)
    }

    /// Fields currently referencing `payment_type` with their record counts.
    /// Fields with no references are left out.
    pub fn usages(&self, tenant_id: TenantId, payment_type: PaymentTypeId) -> Vec<PaymentTypeUsage> {
        self.fields
            .iter()
            .map(|(field, count)| PaymentTypeUsage {
                field: field.clone(),
                count: count(tenant_id, payment_type),
            })
            .filter(|u| u.count > 0)
            .collect()
    }

    pub fn is_referenced(&self, tenant_id: TenantId, payment_type: PaymentTypeId) -> bool {
        self.fields
            .iter()
            .any(|(_, count)| count(tenant_id, payment_type) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::AggregateId;

    const ORDER_FIELD: RelatedField = RelatedField::new("purchasing.order", "payment_type");
    const PARTY_FIELD: RelatedField = RelatedField::new("parties.party", "supplier_payment_type");

    #[test]
    fn reports_only_fields_with_references() {
        let used = PaymentTypeId::new(AggregateId::new());
        let mut guard = ReferenceGuard::new();
        guard.register(ORDER_FIELD, move |_, pt| if pt == used { 2 } else { 0 });
        guard.register(PARTY_FIELD, |_, _| 0);

        let tenant_id = TenantId::new();
        assert_eq!(
            guard.usages(tenant_id, used),
            vec![PaymentTypeUsage {
                field: ORDER_FIELD,
                count: 2
            }]
        );
        assert!(guard.is_referenced(tenant_id, used));
        assert!(!guard.is_referenced(tenant_id, PaymentTypeId::new(AggregateId::new())));
    }

    #[test]
    fn re_registering_a_field_replaces_its_counter() {
        let mut guard = ReferenceGuard::new();
        guard.register(ORDER_FIELD, |_, _| 1);
        guard.register(ORDER_FIELD, |_, _| 0);

        assert_eq!(guard.fields().count(), 1);
        assert!(guard.usages(TenantId::new(), PaymentTypeId::new(AggregateId::new())).is_empty());
    }
}

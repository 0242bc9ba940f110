//! Registration of fields that reference payment types.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A `(model, field)` pair whose values point at payment types.
///
/// Modules declare these as constants (e.g. the purchase order's
/// `payment_type` field) and the host registers them; while any record holds a
/// reference through a registered field, the payment type keeps its kind and
/// cannot be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelatedField {
    pub model: Cow<'static, str>,
    pub field: Cow<'static, str>,
}

impl RelatedField {
    pub const fn new(model: &'static str, field: &'static str) -> Self {
        Self {
            model: Cow::Borrowed(model),
            field: Cow::Borrowed(field),
        }
    }
}

impl core::fmt::Display for RelatedField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.model, self.field)
    }
}

/// How many records currently reference a payment type through one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTypeUsage {
    pub field: RelatedField,
    pub count: usize,
}

impl core::fmt::Display for PaymentTypeUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({} records)", self.field, self.count)
    }
}

/// Render a usage list for error messages, e.g.
/// `purchasing.order.payment_type (2 records), parties.party.supplier_payment_type (1 records)`.
pub(crate) fn describe(usages: &[PaymentTypeUsage]) -> String {
    usages
        .iter()
        .filter(|u| u.count > 0)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_skips_unused_fields() {
        let usages = vec![
            PaymentTypeUsage {
                field: RelatedField::new("purchasing.order", "payment_type"),
                count: 2,
            },
            PaymentTypeUsage {
                field: RelatedField::new("parties.party", "customer_payment_type"),
                count: 0,
            },
        ];
        assert_eq!(describe(&usages), "purchasing.order.payment_type (2 records)");
    }
}

//! Payment type rules for purchase orders.
//!
//! Everything here is a pure function over snapshots: the purchase's own
//! payment type (as a [`PaymentTypeRef`], so its kind is known), the party's
//! role defaults and the invoice being generated.

use rust_decimal::Decimal;

use procura_core::DomainError;
use procura_invoicing::InvoiceDraft;
use procura_parties::PartyPaymentTypes;
use procura_payments::{PaymentKind, PaymentTypeId, PaymentTypeRef, RelatedField};

use crate::order::AGGREGATE_TYPE;

/// Registered reference: the purchase order's payment type.
pub const PURCHASE_PAYMENT_TYPE_FIELD: RelatedField = RelatedField::new(AGGREGATE_TYPE, "payment_type");

/// Whether a payment type of `kind` may be selected on a purchase (payable or both).
pub fn is_selectable(kind: PaymentKind) -> bool {
    kind.covers(PaymentKind::Payable)
}

pub fn validate_purchase_payment_type(payment_type: Option<&PaymentTypeRef>) -> Result<(), DomainError> {
    match payment_type {
        Some(pt) if !is_selectable(pt.kind) => Err(DomainError::validation(format!(
            "payment type {} is {}; purchases accept payable or both",
            pt.id, pt.kind
        ))),
        _ => Ok(()),
    }
}

/// Default payment type for a new purchase.
///
/// Among `candidates` (every live payment type of the tenant) keep the
/// selectable ones; preselect only when exactly one remains.
pub fn default_payment_type<'a>(
    candidates: impl IntoIterator<Item = &'a PaymentTypeRef>,
) -> Option<PaymentTypeId> {
    let mut selectable = candidates.into_iter().filter(|pt| is_selectable(pt.kind));
    match (selectable.next(), selectable.next()) {
        (Some(only), None) => Some(only.id),
        _ => None,
    }
}

/// Payment type after the purchase's party changed: the new party's supplier
/// default, or none.
pub fn on_change_party(party: Option<&PartyPaymentTypes>) -> Option<PaymentTypeId> {
    party.and_then(|p| p.supplier)
}

/// Settlement direction implied by an untaxed amount. Zero is payable.
pub fn target_kind(untaxed_amount: Decimal) -> PaymentKind {
    if untaxed_amount >= Decimal::ZERO {
        PaymentKind::Payable
    } else {
        PaymentKind::Receivable
    }
}

/// Decide the payment type of an invoice generated from a purchase.
///
/// 1. A purchase payment type of kind `both` always wins.
/// 2. Otherwise the invoice's untaxed amount picks the direction, computed
///    from its lines first if the draft does not carry it yet.
/// 3. The purchase payment type is kept when its kind matches that direction.
/// 4. Otherwise fall back to the party's default for the matching role.
///
/// `Ok(None)` means no applicable payment type; that is not an error. An
/// untaxed amount that cannot be computed is.
pub fn resolve_invoice_payment_type(
    purchase_payment_type: Option<&PaymentTypeRef>,
    party: Option<&PartyPaymentTypes>,
    invoice: &mut InvoiceDraft,
) -> Result<Option<PaymentTypeId>, DomainError> {
    if let Some(pt) = purchase_payment_type.filter(|pt| pt.kind == PaymentKind::Both) {
        return Ok(Some(pt.id));
    }

    let kind = target_kind(invoice.ensure_untaxed_amount()?);

    Ok(match purchase_payment_type {
        Some(pt) if pt.kind == kind => Some(pt.id),
        _ => party.and_then(|p| p.for_kind(kind)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::AggregateId;
    use procura_invoicing::{InvoiceLine, InvoiceOrigin, LineType};
    use proptest::prelude::*;

    fn payment_type(kind: PaymentKind) -> PaymentTypeRef {
        PaymentTypeRef::new(PaymentTypeId::new(AggregateId::new()), kind)
    }

    fn line(quantity: i64, unit_price_cents: i64) -> InvoiceLine {
        InvoiceLine {
            line_no: 1,
            line_type: LineType::Line,
            description: "Widget".to_string(),
            quantity: Some(Decimal::new(quantity, 0)),
            unit_price: Some(Decimal::new(unit_price_cents, 2)),
        }
    }

    fn draft_with(lines: Vec<InvoiceLine>) -> InvoiceDraft {
        InvoiceDraft::new(InvoiceOrigin::PurchaseOrder(AggregateId::new()), None, lines)
    }

    fn draft_with_amount(amount: Decimal) -> InvoiceDraft {
        let mut draft = draft_with(vec![]);
        draft.untaxed_amount = Some(amount);
        draft
    }

    struct Defaults {
        supplier: PaymentTypeRef,
        customer: PaymentTypeRef,
    }

    impl Defaults {
        fn new() -> Self {
            Self {
                supplier: payment_type(PaymentKind::Payable),
                customer: payment_type(PaymentKind::Receivable),
            }
        }

        fn party(&self) -> PartyPaymentTypes {
            PartyPaymentTypes {
                supplier: Some(self.supplier.id),
                customer: Some(self.customer.id),
            }
        }
    }

    #[test]
    fn both_kind_on_purchase_wins_regardless_of_sign() {
        let defaults = Defaults::new();
        let both = payment_type(PaymentKind::Both);

        for amount in [Decimal::new(100, 0), Decimal::ZERO, Decimal::new(-100, 0)] {
            let mut draft = draft_with_amount(amount);
            let resolved = resolve_invoice_payment_type(Some(&both), Some(&defaults.party()), &mut draft).unwrap();
            assert_eq!(resolved, Some(both.id));
        }
    }

    #[test]
    fn no_purchase_payment_type_uses_supplier_default_for_positive_amount() {
        let defaults = Defaults::new();
        let mut draft = draft_with(vec![line(2, 1000)]);
        let resolved = resolve_invoice_payment_type(None, Some(&defaults.party()), &mut draft).unwrap();
        assert_eq!(resolved, Some(defaults.supplier.id));
    }

    #[test]
    fn no_purchase_payment_type_uses_customer_default_for_negative_amount() {
        let defaults = Defaults::new();
        let mut draft = draft_with_amount(Decimal::new(-1, 2));
        let resolved = resolve_invoice_payment_type(None, Some(&defaults.party()), &mut draft).unwrap();
        assert_eq!(resolved, Some(defaults.customer.id));
    }

    #[test]
    fn payable_purchase_payment_type_is_replaced_on_credit_note() {
        let defaults = Defaults::new();
        let payable = payment_type(PaymentKind::Payable);
        let mut draft = draft_with_amount(Decimal::new(-5000, 2));

        let resolved = resolve_invoice_payment_type(Some(&payable), Some(&defaults.party()), &mut draft).unwrap();
        assert_eq!(resolved, Some(defaults.customer.id));
        assert_ne!(resolved, Some(payable.id));
    }

    #[test]
    fn payable_purchase_payment_type_is_kept_on_positive_amount() {
        let defaults = Defaults::new();
        let payable = payment_type(PaymentKind::Payable);
        let mut draft = draft_with_amount(Decimal::new(1, 0));

        let resolved = resolve_invoice_payment_type(Some(&payable), Some(&defaults.party()), &mut draft).unwrap();
        assert_eq!(resolved, Some(payable.id));
    }

    #[test]
    fn zero_amount_is_payable() {
        assert_eq!(target_kind(Decimal::ZERO), PaymentKind::Payable);

        let defaults = Defaults::new();
        let mut draft = draft_with(vec![line(0, 1000)]);
        let resolved = resolve_invoice_payment_type(None, Some(&defaults.party()), &mut draft).unwrap();
        assert_eq!(resolved, Some(defaults.supplier.id));
    }

    #[test]
    fn mixed_lines_compute_negative_untaxed_amount_and_pick_receivable() {
        let defaults = Defaults::new();
        let mut draft = draft_with(vec![line(2, 1000), line(1, -2500)]);

        let resolved = resolve_invoice_payment_type(None, Some(&defaults.party()), &mut draft).unwrap();
        assert_eq!(draft.untaxed_amount, Some(Decimal::new(-500, 2)));
        assert_eq!(resolved, Some(defaults.customer.id));
    }

    #[test]
    fn missing_party_default_resolves_to_none() {
        let mut draft = draft_with_amount(Decimal::new(-10, 0));
        let party = PartyPaymentTypes {
            supplier: Some(payment_type(PaymentKind::Payable).id),
            customer: None,
        };
        assert_eq!(resolve_invoice_payment_type(None, Some(&party), &mut draft).unwrap(), None);
        assert_eq!(resolve_invoice_payment_type(None, None, &mut draft).unwrap(), None);
    }

    #[test]
    fn out_of_range_amount_is_an_error() {
        let defaults = Defaults::new();
        let mut oversized = line(1, 100);
        oversized.quantity = Some(Decimal::MAX);
        let mut draft = draft_with(vec![oversized.clone(), oversized]);

        let err = resolve_invoice_payment_type(None, Some(&defaults.party()), &mut draft).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let both = payment_type(PaymentKind::Both);
        let resolved = resolve_invoice_payment_type(Some(&both), Some(&defaults.party()), &mut draft);
        assert_eq!(resolved, Ok(Some(both.id)));
    }

    #[test]
    fn changing_party_copies_supplier_default_or_clears() {
        let defaults = Defaults::new();
        assert_eq!(on_change_party(Some(&defaults.party())), Some(defaults.supplier.id));
        assert_eq!(on_change_party(Some(&PartyPaymentTypes::default())), None);
        assert_eq!(on_change_party(None), None);
    }

    #[test]
    fn receivable_payment_type_is_not_selectable() {
        assert!(validate_purchase_payment_type(Some(&payment_type(PaymentKind::Payable))).is_ok());
        assert!(validate_purchase_payment_type(Some(&payment_type(PaymentKind::Both))).is_ok());
        assert!(validate_purchase_payment_type(None).is_ok());

        let err = validate_purchase_payment_type(Some(&payment_type(PaymentKind::Receivable))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn default_requires_exactly_one_selectable_candidate() {
        let payable = payment_type(PaymentKind::Payable);
        let receivable = payment_type(PaymentKind::Receivable);
        let both = payment_type(PaymentKind::Both);

        let none: [PaymentTypeRef; 0] = [];
        assert_eq!(default_payment_type(&none), None);
        assert_eq!(default_payment_type(&[receivable]), None);
        assert_eq!(default_payment_type(&[receivable, payable]), Some(payable.id));
        assert_eq!(default_payment_type(&[payable, both]), None);
    }

    fn any_kind() -> impl Strategy<Value = PaymentKind> {
        prop_oneof![
            Just(PaymentKind::Payable),
            Just(PaymentKind::Receivable),
            Just(PaymentKind::Both),
        ]
    }

    proptest! {
        /// Property: the resolved payment type never settles the wrong direction.
        #[test]
        fn resolution_matches_amount_direction(
            cents in -1_000_000i64..1_000_000,
            purchase_kind in prop::option::of(any_kind()),
            has_supplier in any::<bool>(),
            has_customer in any::<bool>(),
        ) {
            let defaults = Defaults::new();
            let purchase = purchase_kind.map(payment_type);
            let party = PartyPaymentTypes {
                supplier: has_supplier.then_some(defaults.supplier.id),
                customer: has_customer.then_some(defaults.customer.id),
            };
            let amount = Decimal::new(cents, 2);
            let mut draft = draft_with_amount(amount);

            let resolved = resolve_invoice_payment_type(purchase.as_ref(), Some(&party), &mut draft).unwrap();
            let direction = target_kind(amount);

            let expected = match purchase {
                Some(pt) if pt.kind == PaymentKind::Both || pt.kind == direction => Some(pt.id),
                _ => party.for_kind(direction),
            };
            prop_assert_eq!(resolved, expected);
        }

        /// Property: the default exists iff exactly one candidate is payable or both.
        #[test]
        fn default_matches_selectable_count(kinds in prop::collection::vec(any_kind(), 0..6)) {
            let candidates: Vec<_> = kinds.iter().copied().map(payment_type).collect();
            let selectable = kinds.iter().filter(|k| **k != PaymentKind::Receivable).count();
            prop_assert_eq!(default_payment_type(&candidates).is_some(), selectable == 1);
        }
    }
}

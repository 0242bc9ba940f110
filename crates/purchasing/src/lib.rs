//! Purchasing domain module (Purchase Orders, event-sourced).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).
//!
//! A purchase order carries an optional payment type (payable or both, editable
//! while draft). When an invoice is generated from the order, the
//! [`PaymentTypeInvoiceBuilder`] decorator decides which payment type the
//! invoice gets from the sign of its untaxed amount; see
//! [`resolve_invoice_payment_type`].

pub mod invoice;
pub mod order;
pub mod payment_type;

pub use invoice::{
    GenericInvoiceBuilder, InvoiceBuilder, PaymentTypeInvoiceBuilder, PurchaseInvoiceSource,
};
pub use order::{
    AGGREGATE_TYPE, AddLine, Approve, ChangeParty, CreatePurchaseOrder, PurchaseLine,
    PurchaseOrder, PurchaseOrderApproved, PurchaseOrderCommand, PurchaseOrderCreated,
    PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderInvoiced, PurchaseOrderLineAdded,
    PurchaseOrderPartyChanged, PurchaseOrderPaymentTypeSet, PurchaseOrderStatus, RecordInvoice,
    SetPaymentType,
};
pub use payment_type::{
    PURCHASE_PAYMENT_TYPE_FIELD, default_payment_type, is_selectable, on_change_party,
    resolve_invoice_payment_type, target_kind, validate_purchase_payment_type,
};

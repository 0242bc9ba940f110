//! Payment types module (event-sourced).
//!
//! A payment type is a tagged category (payable / receivable / both) describing
//! how a financial document is settled. Other modules reference payment types
//! and register the referencing fields so that a referenced payment type keeps
//! its kind and cannot be deleted.

pub mod payment_type;
pub mod references;

pub use payment_type::{
    AGGREGATE_TYPE, CreatePaymentType, DeletePaymentType, PaymentKind, PaymentType,
    PaymentTypeCommand, PaymentTypeCreated, PaymentTypeDeleted, PaymentTypeEvent, PaymentTypeId,
    PaymentTypeRef, PaymentTypeUpdated, UpdatePaymentType,
};
pub use references::{PaymentTypeUsage, RelatedField};

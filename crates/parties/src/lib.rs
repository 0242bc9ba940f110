//! Parties domain module (customers and suppliers, event-sourced).
//!
//! Besides identity and contact details, a party carries one default payment
//! type per role: the supplier default (payable side) and the customer default
//! (receivable side). Purchasing reads them, never writes them.

pub mod party;

pub use party::{
    AGGREGATE_TYPE, CUSTOMER_PAYMENT_TYPE_FIELD, ContactInfo, Party, PartyCommand, PartyEvent,
    PartyId, PartyKind, PartyPaymentTypes, PartyPaymentTypesChanged, PartyRegistered,
    PartyStatus, PartySuspended, PartyUpdated, RegisterParty, SUPPLIER_PAYMENT_TYPE_FIELD,
    SetPaymentTypes, SuspendParty, UpdateDetails,
};

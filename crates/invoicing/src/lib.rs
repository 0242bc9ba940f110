//! Invoicing domain module (supplier invoices, event-sourced).
//!
//! Invoices are generated from purchases. Generation first produces an
//! [`InvoiceDraft`] that callers may still adjust (e.g. its payment type);
//! issuing the draft persists it as an [`Invoice`] aggregate.

pub mod draft;
pub mod invoice;
pub mod line;

pub use draft::{InvoiceDraft, InvoiceOrigin};
pub use invoice::{
    AGGREGATE_TYPE, Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceIssued,
    InvoiceStatus, InvoiceVoided, IssueInvoice, VoidInvoice,
};
pub use line::{InvoiceLine, LineType, line_amount, untaxed_amount};

//! Projections: disposable read models built from published envelopes.
//!
//! Every projection here is tenant-isolated, tolerates redelivery through its
//! per-stream cursors, and can be rebuilt from the event store.

pub mod cursor;
pub mod invoices;
pub mod parties;
pub mod payment_types;
pub mod purchasing;

pub use cursor::{Admission, ProjectionError, StreamCursors};
pub use invoices::{InvoiceReadModel, InvoicesProjection};
pub use parties::{PartyDirectoryProjection, PartyReadModel};
pub use payment_types::{PaymentTypeDirectoryProjection, PaymentTypeReadModel};
pub use purchasing::{PurchaseOrderReadModel, PurchaseOrdersProjection};

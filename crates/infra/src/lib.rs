//! Infrastructure layer: event store, command dispatch, read models and the
//! procurement service facade.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod references;
pub mod services;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use references::ReferenceGuard;
pub use services::{NewPurchaseLine, ProcurementServices, ServiceError};

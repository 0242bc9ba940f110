//! Scenario replay for procura.
//!
//! A scenario is a JSON description of payment types, parties and purchases
//! plus the payment types the purchases and their invoices are expected to
//! end up with. Replaying it drives `ProcurementServices` end to end and
//! reports every expectation.

pub mod config;
pub mod model;
pub mod runner;

pub use config::{SCENARIO_ENV, ScenarioConfig};
pub use model::{Action, Scenario};
pub use runner::{CheckOutcome, ScenarioReport, ensure_success, run};

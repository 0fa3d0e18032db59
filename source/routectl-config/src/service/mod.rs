//! The Service Orchestrator: maps modified configs to the
//! services that depend on them, restarts them in dependency order, and
//! rolls back on failure.

pub mod controller;
pub mod orchestrator;
pub mod table;

pub use controller::{ActionOutcome, InitScriptController, ServiceAction, ServiceController, ServiceStatus};
pub use orchestrator::{restart_for, RestartOptions, RestartReport, ServiceResult};
pub use table::ServiceTables;

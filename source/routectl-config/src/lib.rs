//! Merge engine, list deduplicator, backup store, and service
//! orchestrator for router-style declarative configuration directories.
//!
//! Parses the on-disk `config <type> [<name>] / option / list` format
//! into a typed section graph, merges or removes an overlay against the
//! live configuration, and restarts exactly the services a change
//! affects with rollback on failure. Argument parsing, usage text, and
//! any remote-orchestration layer are the caller's concern; see the
//! `routectl` binary crate for a driver that wires this up as a CLI.

pub mod backup;
pub mod cancel;
pub mod codec;
pub mod dedupe;
pub mod driver;
pub mod error;
pub mod journal;
pub mod lock;
pub mod merge;
pub mod model;
pub mod remove;
pub mod safety;
pub mod service;

pub use cancel::CancellationToken;
pub use driver::{Driver, DriverOptions, OperationSummary};
pub use error::{Result, RouterConfigError};
pub use model::{Config, Section, Value};

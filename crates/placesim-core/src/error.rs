//! Error taxonomy for simulation runs.
//!
//! Admission failures are not errors: a blocked arrival is an expected
//! outcome that feeds the statistics. Everything here either stops a run
//! before it starts (configuration, topology) or aborts it because resource
//! accounting is broken.

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::topology::TopologyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    #[error("Resource ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Unknown routing policy: {0}")]
    UnknownPolicy(String),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
}

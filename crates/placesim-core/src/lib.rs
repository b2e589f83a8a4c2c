//! placesim: discrete-event simulator for datacenter service placement.
//!
//! Services arrive at source nodes of a network, each asking for compute at
//! some datacenter and bandwidth on every link of a path to it. A routing
//! policy from `placesim-policies` picks the datacenter and path or blocks
//! the service; admitted services hold their resources for an exponential
//! holding time. Sweeps over policies, offered loads and seeds report the
//! blocking ratio and the mean link and datacenter utilization.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌──────────────┐
//! │ Topology │────▶│  Engine   │────▶│    Stats     │
//! │ + paths  │     │ (Events)  │     │   Tracker    │
//! └──────────┘     └─────┬─────┘     └──────┬───────┘
//!                        │                  │
//!                ┌───────┴───────┐   ┌──────┴───────┐
//!                │    Policy     │   │  Aggregate   │
//!                │  (Placement)  │   │   Results    │
//!                └───────┬───────┘   └──────────────┘
//!                        │
//!                ┌───────┴───────┐
//!                │    Ledger     │
//!                │ compute + bw  │
//!                └───────────────┘
//! ```

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod ksp;
pub mod ledger;
pub mod service;
pub mod stats;
pub mod topology;

// Re-export key types for convenience.
pub use aggregate::{AggregateResults, BucketSummary, MeanMetrics, Progress};
pub use clock::SimClock;
pub use config::{ConfigError, SimConfig};
pub use coordinator::{execute_one_run, Coordinator, ResultsBundle, RunSpec};
pub use engine::{SimEvent, SimulationEngine};
pub use error::SimError;
pub use ledger::{LedgerError, ResourceLedger};
pub use service::{Service, ServiceStatus};
pub use stats::{RunMetrics, Snapshot, StatsTracker};
pub use topology::{DcPlacement, NodeRole, Topology, TopologyBuilder, TopologyError};

use std::path::Path;
use std::sync::Arc;

/// Load the topology named by `path`, or by the config when `path` is `None`.
pub fn load_topology(config: &SimConfig, path: Option<&Path>) -> Result<Topology, SimError> {
    let path = path.or(config.topology.file.as_deref()).ok_or_else(|| {
        ConfigError::Validation(
            "no topology file: set topology.file or pass --topology".to_string(),
        )
    })?;
    Ok(Topology::from_file(path, &config.topology)?)
}

/// Run every configured policy once at the same load and seed index.
pub fn compare_policies(
    config: &SimConfig,
    topology: Arc<Topology>,
    load: f64,
    seed_index: u32,
) -> Result<Vec<RunMetrics>, SimError> {
    config
        .policies
        .names
        .iter()
        .map(|name| {
            let spec = RunSpec::new(name.clone(), load, seed_index, config.simulation.seed);
            execute_one_run(config, Arc::clone(&topology), &spec)
        })
        .collect()
}

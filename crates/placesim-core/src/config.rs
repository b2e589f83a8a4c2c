//! TOML configuration parsing for placesim.
//!
//! Defines the complete configuration schema for a policy × load sweep:
//! run sizing, traffic model, topology provider parameters, and the list of
//! routing policies to compare.

use crate::topology::DcPlacement;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub simulation: SimulationSection,
    pub traffic: TrafficSection,
    #[serde(default)]
    pub topology: TopologySection,
    #[serde(default)]
    pub policies: PoliciesSection,
}

/// Run sizing and execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Human-readable name for this sweep.
    #[serde(default = "default_sim_name")]
    pub name: String,
    /// Base seed; every run derives its own stream from it.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Arrivals generated per run.
    #[serde(default = "default_num_arrivals")]
    pub num_arrivals: u64,
    /// Take a statistics snapshot every this many arrivals.
    #[serde(default = "default_track_stats_every")]
    pub track_stats_every: u64,
    /// Independent seeds per (policy, load) combination.
    #[serde(default = "default_num_seeds")]
    pub num_seeds: u32,
    /// Worker threads for the sweep. Defaults to the available parallelism.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Seconds between progress reports while the sweep runs.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
    /// Process trailing departures after the last arrival and verify that
    /// every resource is back at its total.
    #[serde(default = "default_true")]
    pub drain_departures: bool,
    /// Directory the results bundle is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_sim_name() -> String {
    "simulation".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_num_arrivals() -> u64 {
    10_000
}
fn default_track_stats_every() -> u64 {
    1_000
}
fn default_num_seeds() -> u32 {
    5
}
fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
fn default_progress_interval() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

/// Inclusive integer range a demand is drawn uniformly from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRange {
    pub min: u32,
    pub max: u32,
}

impl UnitRange {
    pub fn fixed(units: u32) -> Self {
        Self {
            min: units,
            max: units,
        }
    }
}

impl Default for UnitRange {
    fn default() -> Self {
        Self::fixed(1)
    }
}

/// Offered traffic model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSection {
    /// Lowest load in the sweep, in Erlangs.
    pub min_load: f64,
    /// Highest load in the sweep, in Erlangs.
    pub max_load: f64,
    /// Step between consecutive loads.
    #[serde(default = "default_load_step")]
    pub load_step: f64,
    /// Mean service holding time, in normalized time units.
    #[serde(default = "default_mean_holding_time")]
    pub mean_holding_time: f64,
    /// Compute units requested per service.
    #[serde(default)]
    pub computing_units: UnitRange,
    /// Network units requested on every link of the chosen path.
    #[serde(default)]
    pub network_units: UnitRange,
}

fn default_load_step() -> f64 {
    50.0
}
fn default_mean_holding_time() -> f64 {
    1.0
}

/// Parameters handed to the topology provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySection {
    /// Topology description file. The CLI `--topology` flag overrides it.
    pub file: Option<PathBuf>,
    /// Candidate paths kept per (source, datacenter) pair.
    #[serde(default = "default_k_paths")]
    pub k_paths: usize,
    /// Datacenters to place when the file marks none.
    #[serde(default = "default_num_dcs")]
    pub num_dcs: usize,
    /// How placed datacenters are chosen.
    #[serde(default)]
    pub dc_placement: DcPlacement,
    /// Compute capacity of every placed datacenter.
    #[serde(default = "default_compute_units_per_dc")]
    pub compute_units_per_dc: u32,
    /// Capacity of every link without an explicit value, and the
    /// normalization constant for load-balancing scores.
    #[serde(default = "default_network_units_per_link")]
    pub network_units_per_link: u32,
}

fn default_k_paths() -> usize {
    5
}
fn default_num_dcs() -> usize {
    3
}
fn default_compute_units_per_dc() -> u32 {
    100
}
fn default_network_units_per_link() -> u32 {
    50
}

impl Default for TopologySection {
    fn default() -> Self {
        Self {
            file: None,
            k_paths: default_k_paths(),
            num_dcs: default_num_dcs(),
            dc_placement: DcPlacement::default(),
            compute_units_per_dc: default_compute_units_per_dc(),
            network_units_per_link: default_network_units_per_link(),
        }
    }
}

/// Routing policies compared in the sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesSection {
    #[serde(default = "default_policy_names")]
    pub names: Vec<String>,
}

fn default_policy_names() -> Vec<String> {
    placesim_policies::available_policies()
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for PoliciesSection {
    fn default() -> Self {
        Self {
            names: default_policy_names(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.finalize()
    }

    /// Normalize policy names and validate. Call again after editing a
    /// loaded config.
    pub fn finalize(mut self) -> Result<Self, ConfigError> {
        self.normalize_policy_names();
        self.validate()?;
        Ok(self)
    }

    /// Rewrite policy names to their short codes. Unknown names are left
    /// untouched for [`validate`](Self::validate) to report.
    fn normalize_policy_names(&mut self) {
        for name in &mut self.policies.names {
            if let Some(code) = placesim_policies::canonical_policy_name(name) {
                *name = code.to_string();
            }
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.num_arrivals == 0 {
            return Err(ConfigError::Validation(
                "num_arrivals must be > 0".to_string(),
            ));
        }
        if sim.track_stats_every == 0 {
            return Err(ConfigError::Validation(
                "track_stats_every must be > 0".to_string(),
            ));
        }
        if sim.num_seeds == 0 {
            return Err(ConfigError::Validation("num_seeds must be > 0".to_string()));
        }
        if sim.threads == 0 {
            return Err(ConfigError::Validation("threads must be > 0".to_string()));
        }

        let traffic = &self.traffic;
        if !is_positive(traffic.min_load) {
            return Err(ConfigError::Validation(format!(
                "min_load must be a positive number, got {}",
                traffic.min_load
            )));
        }
        if !traffic.max_load.is_finite() || traffic.max_load < traffic.min_load {
            return Err(ConfigError::Validation(format!(
                "max_load ({}) must be >= min_load ({})",
                traffic.max_load, traffic.min_load
            )));
        }
        if !is_positive(traffic.load_step) {
            return Err(ConfigError::Validation(format!(
                "load_step must be > 0, got {}",
                traffic.load_step
            )));
        }
        if !is_positive(traffic.mean_holding_time) {
            return Err(ConfigError::Validation(format!(
                "mean_holding_time must be a positive number, got {}",
                traffic.mean_holding_time
            )));
        }
        for (label, range) in [
            ("computing_units", traffic.computing_units),
            ("network_units", traffic.network_units),
        ] {
            if range.min > range.max {
                return Err(ConfigError::Validation(format!(
                    "{label}: min ({}) must be <= max ({})",
                    range.min, range.max
                )));
            }
        }

        let topo = &self.topology;
        if topo.k_paths == 0 {
            return Err(ConfigError::Validation("k_paths must be > 0".to_string()));
        }
        if topo.compute_units_per_dc == 0 {
            return Err(ConfigError::Validation(
                "compute_units_per_dc must be > 0".to_string(),
            ));
        }
        if topo.network_units_per_link == 0 {
            return Err(ConfigError::Validation(
                "network_units_per_link must be > 0".to_string(),
            ));
        }

        if self.policies.names.is_empty() {
            return Err(ConfigError::Validation(
                "at least one policy must be configured".to_string(),
            ));
        }
        let mut seen = Vec::with_capacity(self.policies.names.len());
        for name in &self.policies.names {
            let Some(code) = placesim_policies::canonical_policy_name(name) else {
                return Err(ConfigError::Validation(format!(
                    "unknown policy '{}'. Available: {:?}",
                    name,
                    placesim_policies::available_policies()
                )));
            };
            if seen.contains(&code) {
                return Err(ConfigError::Validation(format!(
                    "policy '{}' is listed more than once",
                    code
                )));
            }
            seen.push(code);
        }
        Ok(())
    }

    /// Loads in the sweep, from `min_load` to `max_load` inclusive.
    pub fn loads(&self) -> Vec<f64> {
        let t = &self.traffic;
        let steps = ((t.max_load - t.min_load) / t.load_step + 1e-9).floor() as usize;
        (0..=steps)
            .map(|i| t.min_load + i as f64 * t.load_step)
            .collect()
    }

    /// Total number of runs the sweep will perform.
    pub fn total_runs(&self) -> usize {
        self.policies.names.len() * self.loads().len() * self.simulation.num_seeds as usize
    }
}

fn is_positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

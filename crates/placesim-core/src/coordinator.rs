//! Policy × load × seed sweeps.
//!
//! Every run is independent: it builds its own ledger from the shared,
//! read-only [`Topology`] and its own random stream from its [`RunSpec`].
//! Runs are fanned out on a `rayon` pool and report into a shared
//! [`AggregateResults`] while a watcher thread logs progress.

use crate::aggregate::{AggregateResults, BucketSummary, Progress};
use crate::config::SimConfig;
use crate::engine::SimulationEngine;
use crate::error::SimError;
use crate::stats::RunMetrics;
use crate::topology::Topology;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// File name of the results bundle inside the output directory.
pub const RESULTS_FILE: &str = "final_results.json";

/// Identity of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Policy short code.
    pub policy: String,
    pub load: f64,
    pub seed_index: u32,
    pub seed: u64,
}

impl RunSpec {
    pub fn new(policy: impl Into<String>, load: f64, seed_index: u32, base_seed: u64) -> Self {
        Self {
            policy: policy.into(),
            load,
            seed_index,
            seed: derive_seed(base_seed, load, seed_index),
        }
    }
}

/// Seed for the run at (`load`, `seed_index`).
///
/// The policy is not mixed in, so every policy sees the same
/// arrival stream for a given load and seed index.
pub fn derive_seed(base_seed: u64, load: f64, seed_index: u32) -> u64 {
    let mixed = splitmix64(base_seed ^ load.to_bits());
    splitmix64(mixed ^ seed_index as u64)
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Every run of the sweep, ordered by policy, load, then seed index.
pub fn plan_runs(config: &SimConfig) -> Vec<RunSpec> {
    let loads = config.loads();
    let mut runs = Vec::with_capacity(config.total_runs());
    for policy in &config.policies.names {
        for &load in &loads {
            for seed_index in 0..config.simulation.num_seeds {
                runs.push(RunSpec::new(
                    policy.clone(),
                    load,
                    seed_index,
                    config.simulation.seed,
                ));
            }
        }
    }
    runs
}

/// Execute a single run. Safe to call from any number of threads at once.
pub fn execute_one_run(
    config: &SimConfig,
    topology: Arc<Topology>,
    spec: &RunSpec,
) -> Result<RunMetrics, SimError> {
    let policy = placesim_policies::policy_by_name(
        &spec.policy,
        config.topology.network_units_per_link,
    )
    .ok_or_else(|| SimError::UnknownPolicy(spec.policy.clone()))?;
    let mut engine = SimulationEngine::new(spec.clone(), topology, policy, config)?;
    engine.run()
}

/// Final output of a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsBundle {
    pub config: SimConfig,
    pub topology: String,
    pub policies: Vec<String>,
    pub loads: Vec<f64>,
    pub summaries: Vec<BucketSummary>,
    pub runs: Vec<RunMetrics>,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
}

impl ResultsBundle {
    /// Write the bundle as pretty JSON into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, SimError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(RESULTS_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn read_from(path: &Path) -> Result<Self, SimError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Runs a configured sweep.
pub struct Coordinator {
    config: SimConfig,
    topology: Arc<Topology>,
}

impl Coordinator {
    pub fn new(config: SimConfig, topology: Arc<Topology>) -> Self {
        Self { config, topology }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Empty result buckets for this sweep.
    pub fn new_results(&self) -> AggregateResults {
        AggregateResults::new(
            self.config.policies.names.clone(),
            self.config.loads(),
            self.config.simulation.num_seeds as usize,
        )
    }

    /// Run the whole sweep and bundle the results.
    pub fn run_all(&self) -> Result<ResultsBundle, SimError> {
        let started = Instant::now();
        let results = self.new_results();
        self.run_into(&results)?;

        let elapsed = started.elapsed();
        info!(
            runs = results.progress().performed,
            elapsed_secs = elapsed.as_secs_f64(),
            "Sweep finished"
        );
        Ok(ResultsBundle {
            config: self.config.clone(),
            topology: self.topology.name.clone(),
            policies: results.policies().to_vec(),
            loads: results.loads().to_vec(),
            summaries: results.summaries(),
            runs: results.runs(),
            elapsed_secs: elapsed.as_secs_f64(),
            finished_at: Utc::now(),
        })
    }

    /// Run the whole sweep, recording into `results` as runs finish.
    ///
    /// On error, `results` keeps every run that completed before it.
    pub fn run_into(&self, results: &AggregateResults) -> Result<(), SimError> {
        let runs = plan_runs(&self.config);
        let threads = self.config.simulation.threads;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("placesim-worker-{}", i))
            .build()?;
        let interval = Duration::from_secs(self.config.simulation.progress_interval_secs.max(1));

        info!(
            runs = runs.len(),
            threads,
            topology = %self.topology.name,
            "Starting sweep"
        );

        let done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            let watcher = scope.spawn(|| watch_progress(results, &done, interval));

            // Releases the watcher even when a worker panic unwinds through here.
            let stop = StopWatcher {
                done: &done,
                watcher: watcher.thread(),
            };
            let outcome = pool.install(|| {
                runs.par_iter().try_for_each(|spec| {
                    let metrics = execute_one_run(&self.config, Arc::clone(&self.topology), spec)?;
                    debug!(
                        policy = %spec.policy,
                        load = spec.load,
                        seed_index = spec.seed_index,
                        blocking_ratio = metrics.blocking_ratio,
                        "Run recorded"
                    );
                    results.record(metrics)
                })
            });

            drop(stop);
            if let Err(panic) = watcher.join() {
                std::panic::resume_unwind(panic);
            }
            outcome
        })
    }
}

/// Sets `done` and wakes the watcher when dropped.
struct StopWatcher<'a> {
    done: &'a AtomicBool,
    watcher: &'a std::thread::Thread,
}

impl Drop for StopWatcher<'_> {
    fn drop(&mut self) {
        self.done.store(true, Ordering::Release);
        self.watcher.unpark();
    }
}

/// Log progress every `interval` until `done` is set.
fn watch_progress(results: &AggregateResults, done: &AtomicBool, interval: Duration) {
    let mut next = Instant::now() + interval;
    while !done.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= next {
            log_progress(results.progress());
            next = now + interval;
        } else {
            std::thread::park_timeout(next - now);
        }
    }
}

fn log_progress(progress: Progress) {
    info!(
        performed = progress.performed,
        total = progress.total,
        "Progress: {:.1}%",
        progress.fraction() * 100.0
    );
}

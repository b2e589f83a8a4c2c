//! Statistics sampling for simulation runs.
//!
//! Tracks the cumulative blocking ratio and instantaneous link and datacenter
//! utilization of a single run as a time series of [`Snapshot`]s, and the
//! [`RunMetrics`] reported when the run finishes.

use crate::aggregate::BucketSummary;
use crate::ledger::ResourceLedger;
use serde::{Deserialize, Serialize};

/// Statistics at one instant of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Arrivals processed when the snapshot was taken.
    pub arrivals: u64,
    /// Simulated time of the snapshot.
    pub time: f64,
    /// Blocked over arrived since the run began.
    pub blocking_ratio: f64,
    /// Mean used/total over all links, at this instant.
    pub avg_link_utilization: f64,
    /// Mean used/total over all datacenters, at this instant.
    pub avg_datacenter_utilization: f64,
}

impl Snapshot {
    /// Figures of `ledger` and the blocking counters at `time`.
    pub fn capture(arrivals: u64, blocked: u64, time: f64, ledger: &ResourceLedger) -> Self {
        Self {
            arrivals,
            time,
            blocking_ratio: blocking_ratio(blocked, arrivals),
            avg_link_utilization: ledger.link_utilization(),
            avg_datacenter_utilization: ledger.datacenter_utilization(),
        }
    }
}

/// Accumulates snapshots in call order.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    samples: Vec<Snapshot>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for the number of samples a run will take.
    pub fn with_capacity(samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(samples),
        }
    }

    /// Record and return a snapshot of the current run state.
    pub fn sample(
        &mut self,
        arrivals: u64,
        blocked: u64,
        time: f64,
        ledger: &ResourceLedger,
    ) -> Snapshot {
        let snapshot = Snapshot::capture(arrivals, blocked, time, ledger);
        self.samples.push(snapshot);
        snapshot
    }

    pub fn samples(&self) -> &[Snapshot] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Snapshot> {
        self.samples
    }
}

/// `blocked / arrivals`, or 0.0 before the first arrival.
pub fn blocking_ratio(blocked: u64, arrivals: u64) -> f64 {
    if arrivals == 0 {
        0.0
    } else {
        blocked as f64 / arrivals as f64
    }
}

/// Final metrics of a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Policy short code.
    pub policy: String,
    /// Offered load in Erlangs.
    pub load: f64,
    /// Index of the seed within the (policy, load) bucket.
    pub seed_index: u32,
    /// Seed the run's random stream was created from.
    pub seed: u64,
    pub arrivals: u64,
    pub blocked: u64,
    pub blocking_ratio: f64,
    pub avg_link_utilization: f64,
    pub avg_datacenter_utilization: f64,
    /// Simulated time of the last arrival.
    pub sim_time: f64,
    /// Events dispatched, including drained departures.
    pub events_processed: u64,
    /// Periodic snapshots, in the order they were taken.
    pub timeline: Vec<Snapshot>,
}

/// Format one run's timeline as a table.
pub fn format_run_table(metrics: &RunMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!(
            "  {} @ {:.1} Erlangs (seed #{})  ",
            metrics.policy, metrics.load, metrics.seed_index
        )
    ));
    out.push_str(&format!(
        "  Arrivals: {} ({} blocked) | Sim time: {:.2} | Events: {}\n",
        metrics.arrivals, metrics.blocked, metrics.sim_time, metrics.events_processed
    ));
    out.push_str(&format!("{:-<70}\n", "  Timeline  "));
    out.push_str(&format!(
        "  {:>10} {:>12} {:>12} {:>12} {:>12}\n",
        "Arrivals", "Time", "Blocking", "Link util", "DC util"
    ));
    for s in &metrics.timeline {
        out.push_str(&format!(
            "  {:>10} {:>12.3} {:>12.6} {:>11.2}% {:>11.2}%\n",
            s.arrivals,
            s.time,
            s.blocking_ratio,
            s.avg_link_utilization * 100.0,
            s.avg_datacenter_utilization * 100.0,
        ));
    }
    out.push_str(&format!("{:-<70}\n", "  Final  "));
    out.push_str(&format!(
        "  Blocking ratio: {:.6}  Link util: {:.2}%  DC util: {:.2}%\n",
        metrics.blocking_ratio,
        metrics.avg_link_utilization * 100.0,
        metrics.avg_datacenter_utilization * 100.0,
    ));
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

/// Format a policy × load comparison of seed-averaged results.
pub fn format_comparison_table(summaries: &[BucketSummary]) -> String {
    if summaries.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<78}\n", "  Policy Comparison  "));
    out.push_str(&format!(
        "{:<8} {:>10} {:>8} {:>16} {:>14} {:>14}\n",
        "Policy", "Load", "Seeds", "Blocking ratio", "Link util", "DC util"
    ));
    out.push_str(&format!("{:-<78}\n", ""));

    for s in summaries {
        match &s.mean {
            Some(mean) => out.push_str(&format!(
                "{:<8} {:>10.1} {:>8} {:>16.6} {:>13.2}% {:>13.2}%\n",
                s.policy,
                s.load,
                s.seeds,
                mean.blocking_ratio,
                mean.avg_link_utilization * 100.0,
                mean.avg_datacenter_utilization * 100.0,
            )),
            None => out.push_str(&format!(
                "{:<8} {:>10.1} {:>8} {:>16} {:>14} {:>14}\n",
                s.policy, s.load, 0, "-", "-", "-"
            )),
        }
    }
    out.push_str(&format!("{:=<78}\n", ""));
    out
}

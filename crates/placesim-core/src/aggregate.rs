//! Cross-seed aggregation of run results.
//!
//! One bucket per (policy, load) pair, registered up front. Workers append
//! finished runs concurrently; readers can summarize at any time and see
//! whatever has completed so far.

use crate::error::SimError;
use crate::stats::RunMetrics;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Arithmetic mean of the three reported figures across seeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanMetrics {
    pub blocking_ratio: f64,
    pub avg_link_utilization: f64,
    pub avg_datacenter_utilization: f64,
}

/// Summary of one (policy, load) bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub policy: String,
    pub load: f64,
    /// Seeds recorded so far.
    pub seeds: usize,
    /// `None` until the first seed is recorded.
    pub mean: Option<MeanMetrics>,
}

/// Runs performed out of runs planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub performed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.performed as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.performed >= self.total
    }
}

/// Append-only results, keyed by (policy, load).
#[derive(Debug)]
pub struct AggregateResults {
    policies: Vec<String>,
    loads: Vec<f64>,
    /// Row-major: `policy_index * loads.len() + load_index`.
    buckets: Vec<Mutex<Vec<RunMetrics>>>,
    seeds_per_bucket: usize,
    performed: AtomicUsize,
}

impl AggregateResults {
    pub fn new(policies: Vec<String>, loads: Vec<f64>, seeds_per_bucket: usize) -> Self {
        let buckets = (0..policies.len() * loads.len())
            .map(|_| Mutex::new(Vec::with_capacity(seeds_per_bucket)))
            .collect();
        Self {
            policies,
            loads,
            buckets,
            seeds_per_bucket,
            performed: AtomicUsize::new(0),
        }
    }

    pub fn policies(&self) -> &[String] {
        &self.policies
    }

    pub fn loads(&self) -> &[f64] {
        &self.loads
    }

    fn bucket_index(&self, policy: &str, load: f64) -> Option<usize> {
        let p = self.policies.iter().position(|name| name == policy)?;
        let l = self
            .loads
            .iter()
            .position(|&candidate| (candidate - load).abs() < 1e-9)?;
        Some(p * self.loads.len() + l)
    }

    /// Append one finished run to its bucket.
    pub fn record(&self, metrics: RunMetrics) -> Result<(), SimError> {
        let index = self
            .bucket_index(&metrics.policy, metrics.load)
            .ok_or_else(|| {
                SimError::InvariantViolation(format!(
                    "no result bucket for policy {} at load {}",
                    metrics.policy, metrics.load
                ))
            })?;
        lock(&self.buckets[index]).push(metrics);
        self.performed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn progress(&self) -> Progress {
        Progress {
            performed: self.performed.load(Ordering::Relaxed),
            total: self.buckets.len() * self.seeds_per_bucket,
        }
    }

    /// Per-bucket means over the seeds recorded so far, by policy then load.
    pub fn summaries(&self) -> Vec<BucketSummary> {
        let mut out = Vec::with_capacity(self.buckets.len());
        for (p, policy) in self.policies.iter().enumerate() {
            for (l, &load) in self.loads.iter().enumerate() {
                let runs = lock(&self.buckets[p * self.loads.len() + l]);
                out.push(BucketSummary {
                    policy: policy.clone(),
                    load,
                    seeds: runs.len(),
                    mean: mean_of(&runs),
                });
            }
        }
        out
    }

    /// Every recorded run, ordered by policy, load and seed index.
    pub fn runs(&self) -> Vec<RunMetrics> {
        let mut out = Vec::new();
        for bucket in &self.buckets {
            let mut runs = lock(bucket).clone();
            runs.sort_by_key(|r| r.seed_index);
            out.extend(runs);
        }
        out
    }
}

/// Lock a bucket, ignoring poisoning.
fn lock(bucket: &Mutex<Vec<RunMetrics>>) -> MutexGuard<'_, Vec<RunMetrics>> {
    bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn mean_of(runs: &[RunMetrics]) -> Option<MeanMetrics> {
    if runs.is_empty() {
        return None;
    }
    let n = runs.len() as f64;
    Some(MeanMetrics {
        blocking_ratio: runs.iter().map(|r| r.blocking_ratio).sum::<f64>() / n,
        avg_link_utilization: runs.iter().map(|r| r.avg_link_utilization).sum::<f64>() / n,
        avg_datacenter_utilization: runs
            .iter()
            .map(|r| r.avg_datacenter_utilization)
            .sum::<f64>()
            / n,
    })
}

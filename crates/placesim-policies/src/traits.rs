//! Routing policy trait definitions.
//!
//! All routing policies implement the [`RoutingPolicy`] trait, which receives
//! a service's demand, a read-only view of spare capacity, and the path
//! catalog, and returns an admission decision.

use crate::catalog::{LinkId, NodeId, Path, PathCatalog};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Demand of an arriving service, as seen by routing policies.
///
/// This is the policies crate's view of a service: only what is needed to
/// make an admission decision, not its lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: u64,
    pub source: NodeId,
    pub computing_units: u32,
    pub network_units: u32,
}

/// Read-only view of the spare and total capacity of a run's resources.
///
/// Implemented by the simulation's resource ledger. Node ids that are not
/// datacenters report zero compute.
pub trait CapacityView {
    fn available_compute(&self, datacenter: NodeId) -> u32;
    fn total_compute(&self, datacenter: NodeId) -> u32;
    fn available_network(&self, link: LinkId) -> u32;
    fn total_network(&self, link: LinkId) -> u32;
}

/// Decision returned by a routing policy.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    /// Place the service on `datacenter`, reaching it over `path`.
    Admit { datacenter: NodeId, path: Arc<Path> },
    /// No datacenter/path combination can carry the service right now.
    Reject,
}

impl RoutingDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, RoutingDecision::Admit { .. })
    }
}

/// The core routing policy trait.
///
/// Policies are pure functions of their inputs: no internal randomness and no
/// state carried between calls, so a run replays identically for a fixed seed.
pub trait RoutingPolicy: Send + Sync {
    /// Decide where (and whether) to place `service`.
    fn decide(
        &self,
        service: &ServiceRequest,
        capacity: &dyn CapacityView,
        catalog: &PathCatalog,
    ) -> RoutingDecision;

    /// Short name used in reports and result buckets.
    fn name(&self) -> &str;
}

/// Whether every link of `path` has at least `network_units` spare.
pub fn is_path_free(capacity: &dyn CapacityView, path: &Path, network_units: u32) -> bool {
    path.links()
        .iter()
        .all(|&link| capacity.available_network(link) >= network_units)
}

/// Largest used (total − available) amount among the links of `path`.
pub fn max_link_usage(capacity: &dyn CapacityView, path: &Path) -> u32 {
    path.links()
        .iter()
        .map(|&link| capacity.total_network(link) - capacity.available_network(link))
        .max()
        .unwrap_or(0)
}

/// Used fraction of a datacenter's compute, 0.0 for a zero-capacity node.
pub fn datacenter_utilization(capacity: &dyn CapacityView, datacenter: NodeId) -> f64 {
    let total = capacity.total_compute(datacenter);
    if total == 0 {
        return 0.0;
    }
    (total - capacity.available_compute(datacenter)) as f64 / total as f64
}

/// Walk every feasible (datacenter, path) candidate in catalog order and keep
/// the one with the best score.
///
/// `better(candidate, best)` must return true only on strict improvement, so
/// an equal score never displaces a candidate enumerated earlier.
pub(crate) fn select_best<S, F, B>(
    service: &ServiceRequest,
    capacity: &dyn CapacityView,
    catalog: &PathCatalog,
    mut score: F,
    better: B,
) -> RoutingDecision
where
    S: Copy,
    F: FnMut(NodeId, &Path) -> S,
    B: Fn(S, S) -> bool,
{
    let mut best: Option<(S, NodeId, &Arc<Path>)> = None;

    for &dc in catalog.datacenters() {
        if capacity.available_compute(dc) < service.computing_units {
            continue;
        }
        for path in catalog.candidates(service.source, dc) {
            if !is_path_free(capacity, path, service.network_units) {
                continue;
            }
            let s = score(dc, path);
            match best {
                Some((current, _, _)) if !better(s, current) => {}
                _ => best = Some((s, dc, path)),
            }
        }
    }

    match best {
        Some((_, datacenter, path)) => RoutingDecision::Admit {
            datacenter,
            path: Arc::clone(path),
        },
        None => RoutingDecision::Reject,
    }
}

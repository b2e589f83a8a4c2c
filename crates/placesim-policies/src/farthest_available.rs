//! Farthest-available datacenter policy.
//!
//! The mirror image of [`ClosestAvailable`](crate::ClosestAvailable): among
//! all feasible candidates it picks the path with the most hops. Mostly useful
//! as a pessimistic baseline, since long paths burn bandwidth on every link.

use crate::catalog::PathCatalog;
use crate::traits::*;

/// Most-hops router ("FADC").
pub struct FarthestAvailable;

impl FarthestAvailable {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FarthestAvailable {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingPolicy for FarthestAvailable {
    fn decide(
        &self,
        service: &ServiceRequest,
        capacity: &dyn CapacityView,
        catalog: &PathCatalog,
    ) -> RoutingDecision {
        select_best(
            service,
            capacity,
            catalog,
            |_, path| path.hops(),
            |candidate, best| candidate > best,
        )
    }

    fn name(&self) -> &str {
        "FADC"
    }
}

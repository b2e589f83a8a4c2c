//! Closest-available datacenter policy.
//!
//! Among every datacenter with spare compute and every ranked candidate path
//! with spare bandwidth on all of its links, picks the one with the fewest
//! hops. Keeps services near their source, which saves network capacity at
//! the cost of concentrating load on nearby datacenters.

use crate::catalog::PathCatalog;
use crate::traits::*;

/// Fewest-hops router ("CADC").
pub struct ClosestAvailable;

impl ClosestAvailable {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClosestAvailable {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingPolicy for ClosestAvailable {
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
            |candidate, best| candidate < best,
        )
    }

    fn name(&self) -> &str {
        "CADC"
    }
}

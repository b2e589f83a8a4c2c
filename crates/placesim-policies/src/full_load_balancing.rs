//! Full load-balancing policy.
//!
//! Scores every feasible candidate by the product of its bottleneck link
//! usage (normalized by the per-link capacity constant) and the candidate
//! datacenter's compute utilization, and picks the lowest product. An idle
//! datacenter or an idle path scores zero, so fresh resources are preferred.

use crate::catalog::PathCatalog;
use crate::traits::*;

/// Composite-load router ("FLB").
pub struct FullLoadBalancing {
    /// Nominal capacity of a single link, used to normalize link usage.
    per_link_capacity: u32,
}

impl FullLoadBalancing {
    pub fn new(per_link_capacity: u32) -> Self {
        assert!(
            per_link_capacity > 0,
            "per_link_capacity must be > 0, got {}",
            per_link_capacity
        );
        Self { per_link_capacity }
    }

    /// `(max_link_usage / per_link_capacity) * datacenter_utilization`.
    pub fn score(&self, max_link_usage: u32, datacenter_utilization: f64) -> f64 {
        (max_link_usage as f64 / self.per_link_capacity as f64) * datacenter_utilization
    }
}

impl RoutingPolicy for FullLoadBalancing {
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
            |dc, path| {
                self.score(
                    max_link_usage(capacity, path),
                    datacenter_utilization(capacity, dc),
                )
            },
            |candidate, best| candidate < best,
        )
    }

    fn name(&self) -> &str {
        "FLB"
    }
}

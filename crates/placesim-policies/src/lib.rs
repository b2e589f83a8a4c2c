//! Built-in routing policies for placesim.
//!
//! This crate provides the [`RoutingPolicy`] trait, the [`PathCatalog`] the
//! policies search, and the three built-in admission strategies:
//!
//! | Policy | Code | Strategy |
//! |--------|------|----------|
//! | [`ClosestAvailable`] | `CADC` | Fewest hops among feasible candidates |
//! | [`FarthestAvailable`] | `FADC` | Most hops among feasible candidates |
//! | [`FullLoadBalancing`] | `FLB` | Lowest link-usage × compute-usage product |
//!
//! Every policy walks datacenters in catalog order and each datacenter's
//! candidates in rank order, replacing its current choice only on strict
//! improvement. Equal scores therefore resolve to the earliest candidate.

pub mod catalog;
pub mod closest_available;
pub mod farthest_available;
pub mod full_load_balancing;
pub mod traits;

pub use catalog::{LinkId, NodeId, Path, PathCatalog};
pub use closest_available::ClosestAvailable;
pub use farthest_available::FarthestAvailable;
pub use full_load_balancing::FullLoadBalancing;
pub use traits::*;

/// Create a routing policy by name.
///
/// Accepts the short codes (`CADC`, `FADC`, `FLB`) and the snake_case names,
/// case-insensitively. `per_link_capacity` normalizes link usage for
/// [`FullLoadBalancing`] and must be non-zero.
pub fn policy_by_name(name: &str, per_link_capacity: u32) -> Option<Box<dyn RoutingPolicy>> {
    match canonical_policy_name(name)? {
        "CADC" => Some(Box::new(ClosestAvailable::new())),
        "FADC" => Some(Box::new(FarthestAvailable::new())),
        "FLB" => Some(Box::new(FullLoadBalancing::new(per_link_capacity))),
        _ => None,
    }
}

/// Map any accepted spelling of a policy name to its short code.
pub fn canonical_policy_name(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "cadc" | "closest_available" => Some("CADC"),
        "fadc" | "farthest_available" => Some("FADC"),
        "flb" | "full_load_balancing" => Some("FLB"),
        _ => None,
    }
}

/// List all available built-in policy codes.
pub fn available_policies() -> Vec<&'static str> {
    vec!["CADC", "FADC", "FLB"]
}

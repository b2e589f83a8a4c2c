//! Per-run resource ledger.
//!
//! The ledger owns the mutable capacity state of one run: available compute
//! per datacenter and available bandwidth per link. Totals are copied from the
//! shared [`Topology`] at construction, so no two runs ever alias capacity.
//!
//! Reservations are all-or-nothing: [`ResourceLedger::try_reserve`] checks the
//! datacenter and every link of the path before touching any of them.

use crate::topology::Topology;
use placesim_policies::{CapacityView, LinkId, NodeId, Path};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Release would push {resource} to {attempted} units, above its total of {total}")]
    OverRelease {
        resource: String,
        attempted: u64,
        total: u32,
    },
    #[error("{resource} has {available} available units but a total of {total}")]
    OutOfBounds {
        resource: String,
        available: u32,
        total: u32,
    },
    #[error("Node {0} is not part of the topology")]
    UnknownNode(NodeId),
}

/// Available/total pair for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub available: u32,
    pub total: u32,
}

impl Capacity {
    fn full(total: u32) -> Self {
        Self {
            available: total,
            total,
        }
    }

    pub fn used(&self) -> u32 {
        self.total - self.available
    }

    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used() as f64 / self.total as f64
        }
    }
}

/// Mutable capacity state of one run.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    /// Indexed by node id; non-datacenters have zero capacity.
    compute: Vec<Capacity>,
    /// Indexed by link id.
    network: Vec<Capacity>,
    datacenters: Vec<NodeId>,
}

impl ResourceLedger {
    /// Fresh ledger with every resource fully available.
    pub fn new(topology: &Topology) -> Self {
        Self {
            compute: topology
                .nodes()
                .iter()
                .map(|n| Capacity::full(n.total_compute_units))
                .collect(),
            network: topology
                .links()
                .iter()
                .map(|l| Capacity::full(l.total_network_units))
                .collect(),
            datacenters: topology.datacenters().to_vec(),
        }
    }

    pub fn compute(&self, node: NodeId) -> Capacity {
        self.compute[node as usize]
    }

    pub fn network(&self, link: LinkId) -> Capacity {
        self.network[link]
    }

    /// Reserve `computing_units` at `datacenter` and `network_units` on every
    /// link of `path`, or nothing at all. Returns whether the reservation was
    /// committed.
    pub fn try_reserve(
        &mut self,
        datacenter: NodeId,
        path: &Path,
        computing_units: u32,
        network_units: u32,
    ) -> bool {
        let Some(dc) = self.compute.get(datacenter as usize) else {
            return false;
        };
        if dc.available < computing_units {
            return false;
        }
        if path
            .links()
            .iter()
            .any(|&link| self.network[link].available < network_units)
        {
            return false;
        }

        self.compute[datacenter as usize].available -= computing_units;
        for &link in path.links() {
            self.network[link].available -= network_units;
        }
        true
    }

    /// Return a reservation made with [`try_reserve`](Self::try_reserve).
    ///
    /// Fails without modifying anything if any resource would exceed its
    /// total, which means resources were released twice or never reserved.
    pub fn release(
        &mut self,
        datacenter: NodeId,
        path: &Path,
        computing_units: u32,
        network_units: u32,
    ) -> Result<(), LedgerError> {
        let dc = self
            .compute
            .get(datacenter as usize)
            .copied()
            .ok_or(LedgerError::UnknownNode(datacenter))?;
        if dc.available as u64 + computing_units as u64 > dc.total as u64 {
            return Err(LedgerError::OverRelease {
                resource: format!("datacenter {}", datacenter),
                attempted: dc.available as u64 + computing_units as u64,
                total: dc.total,
            });
        }
        for &link in path.links() {
            let cap = self.network[link];
            if cap.available as u64 + network_units as u64 > cap.total as u64 {
                return Err(LedgerError::OverRelease {
                    resource: format!("link {}", link),
                    attempted: cap.available as u64 + network_units as u64,
                    total: cap.total,
                });
            }
        }

        self.compute[datacenter as usize].available += computing_units;
        for &link in path.links() {
            self.network[link].available += network_units;
        }
        Ok(())
    }

    /// Mean used/total over all links, at this instant.
    pub fn link_utilization(&self) -> f64 {
        mean(self.network.iter().map(Capacity::utilization))
    }

    /// Mean used/total over all datacenters, at this instant.
    pub fn datacenter_utilization(&self) -> f64 {
        mean(
            self.datacenters
                .iter()
                .map(|&dc| self.compute[dc as usize].utilization()),
        )
    }

    /// Whether every resource is fully available again.
    pub fn is_at_baseline(&self) -> bool {
        self.compute
            .iter()
            .chain(self.network.iter())
            .all(|c| c.available == c.total)
    }

    /// Check `0 <= available <= total` on every resource.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let compute = self
            .compute
            .iter()
            .enumerate()
            .map(|(id, c)| (format!("datacenter {}", id), c));
        let network = self
            .network
            .iter()
            .enumerate()
            .map(|(id, c)| (format!("link {}", id), c));
        for (resource, cap) in compute.chain(network) {
            if cap.available > cap.total {
                return Err(LedgerError::OutOfBounds {
                    resource,
                    available: cap.available,
                    total: cap.total,
                });
            }
        }
        Ok(())
    }
}

impl CapacityView for ResourceLedger {
    fn available_compute(&self, datacenter: NodeId) -> u32 {
        self.compute
            .get(datacenter as usize)
            .map(|c| c.available)
            .unwrap_or(0)
    }

    fn total_compute(&self, datacenter: NodeId) -> u32 {
        self.compute
            .get(datacenter as usize)
            .map(|c| c.total)
            .unwrap_or(0)
    }

    fn available_network(&self, link: LinkId) -> u32 {
        self.network[link].available
    }

    fn total_network(&self, link: LinkId) -> u32 {
        self.network[link].total
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (n, sum) = values.fold((0usize, 0.0), |(n, sum), v| (n + 1, sum + v));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

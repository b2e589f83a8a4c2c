//! Service model.
//!
//! Each [`Service`] is one resource request: it arrives at a traffic source,
//! asks for compute at some datacenter and bandwidth along the path to it,
//! and, if admitted, holds both until it departs.

use crate::error::SimError;
use placesim_policies::{NodeId, Path, ServiceRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle of a service.
///
/// `Pending` moves to `Admitted` or `Rejected`; only `Admitted` moves on, to
/// `Departed`. No state is ever revisited.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
    #[default]
    Pending,
    Admitted,
    Rejected,
    Departed,
}

/// A single service flowing through the simulated system.
#[derive(Debug, Clone)]
pub struct Service {
    pub id: u64,
    pub source: NodeId,
    pub computing_units: u32,
    pub network_units: u32,
    pub arrival_time: f64,
    pub holding_time: f64,
    datacenter: Option<NodeId>,
    path: Option<Arc<Path>>,
    status: ServiceStatus,
}

impl Service {
    pub fn new(
        id: u64,
        source: NodeId,
        computing_units: u32,
        network_units: u32,
        arrival_time: f64,
        holding_time: f64,
    ) -> Self {
        Self {
            id,
            source,
            computing_units,
            network_units,
            arrival_time,
            holding_time,
            datacenter: None,
            path: None,
            status: ServiceStatus::Pending,
        }
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Assigned datacenter, once admitted.
    pub fn datacenter(&self) -> Option<NodeId> {
        self.datacenter
    }

    /// Assigned path, once admitted.
    pub fn path(&self) -> Option<&Arc<Path>> {
        self.path.as_ref()
    }

    /// Time the service releases its resources.
    pub fn departure_time(&self) -> f64 {
        self.arrival_time + self.holding_time
    }

    /// The policy-facing view of this service's demand.
    pub fn request(&self) -> ServiceRequest {
        ServiceRequest {
            id: self.id,
            source: self.source,
            computing_units: self.computing_units,
            network_units: self.network_units,
        }
    }

    pub fn admit(&mut self, datacenter: NodeId, path: Arc<Path>) -> Result<(), SimError> {
        self.transition(ServiceStatus::Pending, ServiceStatus::Admitted)?;
        self.datacenter = Some(datacenter);
        self.path = Some(path);
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), SimError> {
        self.transition(ServiceStatus::Pending, ServiceStatus::Rejected)
    }

    pub fn depart(&mut self) -> Result<(), SimError> {
        self.transition(ServiceStatus::Admitted, ServiceStatus::Departed)
    }

    fn transition(&mut self, from: ServiceStatus, to: ServiceStatus) -> Result<(), SimError> {
        if self.status != from {
            return Err(SimError::InvariantViolation(format!(
                "service {} cannot move {:?} -> {:?}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }
}

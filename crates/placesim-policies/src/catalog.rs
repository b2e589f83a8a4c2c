//! Candidate paths between traffic sources and datacenters.
//!
//! A [`PathCatalog`] is built once per topology and then shared read-only by
//! every run. Paths carry both their node sequence and the dense link ids
//! they traverse, so feasibility checks never hash node pairs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Dense node identifier assigned by the topology.
pub type NodeId = u32;

/// Dense link identifier assigned by the topology.
pub type LinkId = usize;

/// A loop-free route from a source node to a datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    nodes: Vec<NodeId>,
    links: Vec<LinkId>,
}

impl Path {
    /// Create a path from its node sequence and the links joining them.
    ///
    /// # Panics
    ///
    /// Panics if `links.len() + 1 != nodes.len()`.
    pub fn new(nodes: Vec<NodeId>, links: Vec<LinkId>) -> Self {
        assert_eq!(
            links.len() + 1,
            nodes.len(),
            "a path over {} nodes needs {} links, got {}",
            nodes.len(),
            nodes.len().saturating_sub(1),
            links.len(),
        );
        Self { nodes, links }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn source(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn destination(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// Number of links traversed.
    pub fn hops(&self) -> usize {
        self.links.len()
    }
}

/// Ranked candidate paths for every (source, datacenter) pair.
#[derive(Debug, Clone, Default)]
pub struct PathCatalog {
    /// Datacenters in enumeration order. Policies iterate in this order.
    datacenters: Vec<NodeId>,
    paths: HashMap<(NodeId, NodeId), Vec<Arc<Path>>>,
}

impl PathCatalog {
    pub fn new(datacenters: Vec<NodeId>) -> Self {
        Self {
            datacenters,
            paths: HashMap::new(),
        }
    }

    /// Register the ranked candidates for one pair, replacing any previous list.
    pub fn insert(&mut self, source: NodeId, datacenter: NodeId, ranked: Vec<Path>) {
        self.paths.insert(
            (source, datacenter),
            ranked.into_iter().map(Arc::new).collect(),
        );
    }

    pub fn datacenters(&self) -> &[NodeId] {
        &self.datacenters
    }

    /// Ranked candidates for a pair. Empty when none were precomputed.
    pub fn candidates(&self, source: NodeId, datacenter: NodeId) -> &[Arc<Path>] {
        self.paths
            .get(&(source, datacenter))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of (source, datacenter) pairs with at least one candidate.
    pub fn routable_pairs(&self) -> usize {
        self.paths.values().filter(|v| !v.is_empty()).count()
    }

    pub fn total_paths(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }
}

//! Network topology and candidate-path provider.
//!
//! A [`Topology`] is built once, before any run, and shared read-only between
//! runs through an `Arc`. It holds node and link definitions with their total
//! capacities, the traffic-source and datacenter sets, and the
//! [`PathCatalog`] of ranked candidate paths. Available capacity is tracked
//! per run by the [`ResourceLedger`](crate::ledger::ResourceLedger).
//!
//! Topologies come from a TOML description file ([`TopologyFile`]) or from a
//! [`TopologyBuilder`]. When no node is marked as a datacenter, datacenters
//! are placed automatically according to a [`DcPlacement`] criterion.

use crate::config::TopologySection;
use crate::ksp;
use placesim_policies::{LinkId, NodeId, PathCatalog};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path as FsPath;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Failed to read topology file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse topology: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),
    #[error("Link references unknown node: {0}")]
    UnknownNode(String),
    #[error("Link {0} connects a node to itself")]
    SelfLoop(String),
    #[error("Duplicate link between {0} and {1}")]
    DuplicateLink(String, String),
    #[error("Cannot place {requested} datacenters on a topology with {available} nodes")]
    TooManyDatacenters { requested: usize, available: usize },
    #[error("Topology has no datacenters")]
    NoDatacenters,
    #[error("Topology has no traffic sources")]
    NoSources,
    #[error("k_paths must be > 0")]
    ZeroPaths,
}

/// Role a node plays in the topology.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Forwards traffic only.
    Transit,
    /// Originates service requests.
    #[default]
    Source,
    /// Hosts services and owns compute capacity.
    Datacenter,
}

/// Criterion for choosing datacenter locations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcPlacement {
    /// Highest node degree first.
    #[default]
    Degree,
    /// Highest hop-count closeness centrality first.
    Closeness,
    /// First nodes in definition order.
    First,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,
    /// Compute capacity. Zero unless the node is a datacenter.
    pub total_compute_units: u32,
}

/// An undirected link; capacity is shared by both traversal directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub a: NodeId,
    pub b: NodeId,
    pub total_network_units: u32,
}

/// Immutable, pre-annotated network graph.
#[derive(Debug, Clone)]
pub struct Topology {
    pub name: String,
    nodes: Vec<Node>,
    links: Vec<Link>,
    /// Sorted by neighbor id.
    adjacency: Vec<Vec<(NodeId, LinkId)>>,
    link_index: HashMap<(NodeId, NodeId), LinkId>,
    datacenters: Vec<NodeId>,
    sources: Vec<NodeId>,
    catalog: PathCatalog,
    k_paths: usize,
}

impl Topology {
    pub fn builder(name: impl Into<String>) -> TopologyBuilder {
        TopologyBuilder::new(name)
    }

    /// Load a topology description file and annotate it per `section`.
    pub fn from_file(path: &FsPath, section: &TopologySection) -> Result<Self, TopologyError> {
        let content = std::fs::read_to_string(path)?;
        let file: TopologyFile = toml::from_str(&content)?;
        let default_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "topology".to_string());
        file.into_topology(default_name, section)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Link joining `a` and `b`, in either order.
    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.link_index.get(&(a.min(b), a.max(b))).copied()
    }

    /// Neighbors of `node` with the connecting link, sorted by neighbor id.
    pub fn neighbors(&self, node: NodeId) -> &[(NodeId, LinkId)] {
        &self.adjacency[node as usize]
    }

    /// Datacenters in catalog enumeration order.
    pub fn datacenters(&self) -> &[NodeId] {
        &self.datacenters
    }

    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub fn catalog(&self) -> &PathCatalog {
        &self.catalog
    }

    pub fn k_paths(&self) -> usize {
        self.k_paths
    }
}

/// Programmatic topology construction.
///
/// Nodes and links are referenced by name; names are resolved and checked in
/// [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    name: String,
    nodes: Vec<(String, NodeRole, u32)>,
    links: Vec<(String, String, u32)>,
    placement: Option<(usize, DcPlacement, u32)>,
}

impl TopologyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            links: Vec::new(),
            placement: None,
        }
    }

    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.nodes.push((name.into(), NodeRole::Source, 0));
        self
    }

    pub fn transit(mut self, name: impl Into<String>) -> Self {
        self.nodes.push((name.into(), NodeRole::Transit, 0));
        self
    }

    pub fn datacenter(mut self, name: impl Into<String>, compute_units: u32) -> Self {
        self.nodes
            .push((name.into(), NodeRole::Datacenter, compute_units));
        self
    }

    pub fn link(mut self, a: impl Into<String>, b: impl Into<String>, network_units: u32) -> Self {
        self.links.push((a.into(), b.into(), network_units));
        self
    }

    /// Turn `count` nodes into datacenters at build time if no node was
    /// declared as one.
    pub fn place_datacenters(
        mut self,
        count: usize,
        placement: DcPlacement,
        compute_units: u32,
    ) -> Self {
        self.placement = Some((count, placement, compute_units));
        self
    }

    /// Resolve names, place datacenters, and precompute `k_paths` candidates
    /// for every (source, datacenter) pair.
    pub fn build(self, k_paths: usize) -> Result<Topology, TopologyError> {
        if k_paths == 0 {
            return Err(TopologyError::ZeroPaths);
        }

        let mut ids: HashMap<&str, NodeId> = HashMap::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (idx, (name, role, compute)) in self.nodes.iter().enumerate() {
            let id = idx as NodeId;
            if ids.insert(name.as_str(), id).is_some() {
                return Err(TopologyError::DuplicateNode(name.clone()));
            }
            nodes.push(Node {
                id,
                name: name.clone(),
                role: *role,
                total_compute_units: if *role == NodeRole::Datacenter {
                    *compute
                } else {
                    0
                },
            });
        }

        let mut links = Vec::with_capacity(self.links.len());
        let mut link_index = HashMap::new();
        let mut adjacency: Vec<Vec<(NodeId, LinkId)>> = vec![Vec::new(); nodes.len()];
        for (a_name, b_name, units) in &self.links {
            let a = *ids
                .get(a_name.as_str())
                .ok_or_else(|| TopologyError::UnknownNode(a_name.clone()))?;
            let b = *ids
                .get(b_name.as_str())
                .ok_or_else(|| TopologyError::UnknownNode(b_name.clone()))?;
            if a == b {
                return Err(TopologyError::SelfLoop(a_name.clone()));
            }
            let id = links.len();
            if link_index.insert((a.min(b), a.max(b)), id).is_some() {
                return Err(TopologyError::DuplicateLink(a_name.clone(), b_name.clone()));
            }
            links.push(Link {
                id,
                a,
                b,
                total_network_units: *units,
            });
            adjacency[a as usize].push((b, id));
            adjacency[b as usize].push((a, id));
        }
        for list in &mut adjacency {
            list.sort_unstable();
        }

        let has_declared_dc = nodes.iter().any(|n| n.role == NodeRole::Datacenter);
        if let (false, Some((count, placement, compute))) = (has_declared_dc, self.placement) {
            if count > nodes.len() {
                return Err(TopologyError::TooManyDatacenters {
                    requested: count,
                    available: nodes.len(),
                });
            }
            for id in rank_for_placement(&adjacency, placement)
                .into_iter()
                .take(count)
            {
                let node = &mut nodes[id as usize];
                node.role = NodeRole::Datacenter;
                node.total_compute_units = compute;
            }
        }

        let datacenters: Vec<NodeId> = nodes
            .iter()
            .filter(|n| n.role == NodeRole::Datacenter)
            .map(|n| n.id)
            .collect();
        let sources: Vec<NodeId> = nodes
            .iter()
            .filter(|n| n.role == NodeRole::Source)
            .map(|n| n.id)
            .collect();
        if datacenters.is_empty() {
            return Err(TopologyError::NoDatacenters);
        }
        if sources.is_empty() {
            return Err(TopologyError::NoSources);
        }

        let mut catalog = PathCatalog::new(datacenters.clone());
        for &source in &sources {
            for &dc in &datacenters {
                let ranked = ksp::k_shortest_paths(&adjacency, links.len(), source, dc, k_paths);
                catalog.insert(source, dc, ranked);
            }
        }

        Ok(Topology {
            name: self.name,
            nodes,
            links,
            adjacency,
            link_index,
            datacenters,
            sources,
            catalog,
            k_paths,
        })
    }
}

/// Node ids ordered by placement preference; ties go to the lower id.
fn rank_for_placement(adjacency: &[Vec<(NodeId, LinkId)>], placement: DcPlacement) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = (0..adjacency.len() as NodeId).collect();
    match placement {
        DcPlacement::First => {}
        DcPlacement::Degree => {
            ids.sort_by(|a, b| {
                adjacency[*b as usize]
                    .len()
                    .cmp(&adjacency[*a as usize].len())
                    .then(a.cmp(b))
            });
        }
        DcPlacement::Closeness => {
            let scores: Vec<f64> = ids.iter().map(|&id| closeness(adjacency, id)).collect();
            ids.sort_by(|a, b| {
                scores[*b as usize]
                    .total_cmp(&scores[*a as usize])
                    .then(a.cmp(b))
            });
        }
    }
    ids
}

/// Hop-count closeness centrality: reachable peers over total distance.
fn closeness(adjacency: &[Vec<(NodeId, LinkId)>], node: NodeId) -> f64 {
    let mut dist = vec![usize::MAX; adjacency.len()];
    let mut queue = VecDeque::new();
    dist[node as usize] = 0;
    queue.push_back(node);
    while let Some(current) = queue.pop_front() {
        for &(next, _) in &adjacency[current as usize] {
            if dist[next as usize] == usize::MAX {
                dist[next as usize] = dist[current as usize] + 1;
                queue.push_back(next);
            }
        }
    }
    let (reached, total) = dist
        .iter()
        .filter(|&&d| d != usize::MAX && d > 0)
        .fold((0usize, 0usize), |(n, sum), &d| (n + 1, sum + d));
    if total == 0 {
        0.0
    } else {
        reached as f64 / total as f64
    }
}

/// On-disk topology description.
///
/// ```toml
/// name = "nsfnet"
///
/// [[nodes]]
/// name = "seattle"
///
/// [[nodes]]
/// name = "boulder"
/// role = "datacenter"
/// compute_units = 200
///
/// [[links]]
/// a = "seattle"
/// b = "boulder"
/// network_units = 80
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyFile {
    pub name: Option<String>,
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    #[serde(default)]
    pub role: Option<NodeRole>,
    /// Compute capacity for declared datacenters.
    pub compute_units: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEntry {
    pub a: String,
    pub b: String,
    pub network_units: Option<u32>,
}

impl TopologyFile {
    /// Parse a description from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, TopologyError> {
        Ok(toml::from_str(s)?)
    }

    /// Fill in capacities and placement from `section` and build.
    pub fn into_topology(
        self,
        default_name: String,
        section: &TopologySection,
    ) -> Result<Topology, TopologyError> {
        let mut builder = TopologyBuilder::new(self.name.unwrap_or(default_name));
        for node in self.nodes {
            builder = match node.role.unwrap_or_default() {
                NodeRole::Source => builder.source(node.name),
                NodeRole::Transit => builder.transit(node.name),
                NodeRole::Datacenter => builder.datacenter(
                    node.name,
                    node.compute_units.unwrap_or(section.compute_units_per_dc),
                ),
            };
        }
        for link in self.links {
            builder = builder.link(
                link.a,
                link.b,
                link.network_units
                    .unwrap_or(section.network_units_per_link),
            );
        }
        builder
            .place_datacenters(
                section.num_dcs,
                section.dc_placement,
                section.compute_units_per_dc,
            )
            .build(section.k_paths)
    }
}

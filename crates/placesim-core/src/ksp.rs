//! k-shortest loop-free paths by hop count (Yen's algorithm).
//!
//! Breadth-first search provides the shortest-path primitive since every
//! link weighs one hop. Neighbors are visited in adjacency order, which the
//! topology keeps sorted by neighbor id, so the output is deterministic.

use placesim_policies::{LinkId, NodeId, Path};
use std::collections::VecDeque;

/// Adjacency list: for each node, `(neighbor, link)` pairs.
pub type Adjacency = [Vec<(NodeId, LinkId)>];

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawPath {
    nodes: Vec<NodeId>,
    links: Vec<LinkId>,
}

impl RawPath {
    fn rank_key(&self) -> (usize, &[NodeId]) {
        (self.links.len(), &self.nodes)
    }
}

/// Up to `k` loop-free paths from `source` to `target`, ranked by hop count
/// and then by node sequence.
pub fn k_shortest_paths(
    adjacency: &Adjacency,
    num_links: usize,
    source: NodeId,
    target: NodeId,
    k: usize,
) -> Vec<Path> {
    if k == 0 || source == target {
        return Vec::new();
    }

    let mut blocked_nodes = vec![false; adjacency.len()];
    let mut blocked_links = vec![false; num_links];

    let Some(first) = shortest_path(adjacency, source, target, &blocked_nodes, &blocked_links)
    else {
        return Vec::new();
    };

    let mut accepted: Vec<RawPath> = vec![first];
    let mut candidates: Vec<RawPath> = Vec::new();

    while accepted.len() < k {
        let previous = accepted[accepted.len() - 1].clone();

        for i in 0..previous.links.len() {
            let spur = previous.nodes[i];
            let root_nodes = &previous.nodes[..=i];
            let root_links = &previous.links[..i];

            blocked_nodes.iter_mut().for_each(|b| *b = false);
            blocked_links.iter_mut().for_each(|b| *b = false);

            for path in &accepted {
                if path.nodes.len() > i + 1 && &path.nodes[..=i] == root_nodes {
                    blocked_links[path.links[i]] = true;
                }
            }
            for &node in &root_nodes[..i] {
                blocked_nodes[node as usize] = true;
            }

            if let Some(spur_path) =
                shortest_path(adjacency, spur, target, &blocked_nodes, &blocked_links)
            {
                let mut nodes = root_nodes[..i].to_vec();
                nodes.extend_from_slice(&spur_path.nodes);
                let mut links = root_links.to_vec();
                links.extend_from_slice(&spur_path.links);
                let candidate = RawPath { nodes, links };

                if !accepted.contains(&candidate) && !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }

        let Some(best) = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.rank_key().cmp(&b.rank_key()))
            .map(|(idx, _)| idx)
        else {
            break;
        };
        accepted.push(candidates.swap_remove(best));
    }

    accepted.sort_by(|a, b| a.rank_key().cmp(&b.rank_key()));
    accepted
        .into_iter()
        .map(|p| Path::new(p.nodes, p.links))
        .collect()
}

/// BFS shortest path avoiding blocked nodes and links.
fn shortest_path(
    adjacency: &Adjacency,
    source: NodeId,
    target: NodeId,
    blocked_nodes: &[bool],
    blocked_links: &[bool],
) -> Option<RawPath> {
    let mut parent: Vec<Option<(NodeId, LinkId)>> = vec![None; adjacency.len()];
    let mut visited = vec![false; adjacency.len()];
    let mut queue = VecDeque::new();

    visited[source as usize] = true;
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        if node == target {
            break;
        }
        for &(next, link) in &adjacency[node as usize] {
            if visited[next as usize] || blocked_nodes[next as usize] || blocked_links[link] {
                continue;
            }
            visited[next as usize] = true;
            parent[next as usize] = Some((node, link));
            queue.push_back(next);
        }
    }

    if !visited[target as usize] {
        return None;
    }

    let mut nodes = vec![target];
    let mut links = Vec::new();
    let mut current = target;
    while let Some((prev, link)) = parent[current as usize] {
        nodes.push(prev);
        links.push(link);
        current = prev;
    }
    nodes.reverse();
    links.reverse();
    Some(RawPath { nodes, links })
}

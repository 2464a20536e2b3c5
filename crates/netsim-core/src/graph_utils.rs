use crate::components::ComponentKind;
use crate::{ComponentId, Network, NodeId};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Electrically connected group of buses.
///
/// Only lines join buses into a sub-network; links are controllable
/// transfers and may couple separate sub-networks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubNetwork {
    pub id: usize,
    /// Member buses in model order
    pub buses: Vec<NodeId>,
    pub lines: Vec<ComponentId>,
}

/// Topology summary reported by `validate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub sub_networks: usize,
    pub min_degree: usize,
    pub max_degree: usize,
    pub avg_degree: f64,
}

/// Bus graph with one edge per line (and per link when `with_links`).
fn bus_graph(network: &Network, with_links: bool) -> UnGraph<usize, ComponentId> {
    let mut graph = UnGraph::with_capacity(network.nodes().len(), network.components().len());
    for position in 0..network.nodes().len() {
        graph.add_node(position);
    }
    for component in network.components() {
        let joins = match component.kind() {
            ComponentKind::Line => true,
            ComponentKind::Link => with_links,
            _ => false,
        };
        if !joins {
            continue;
        }
        let (Some(a), Some(b)) = (
            network.node_position(component.bus().as_str()),
            component
                .attachment
                .secondary()
                .and_then(|bus| network.node_position(bus.as_str())),
        ) else {
            continue;
        };
        graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), component.id.clone());
    }
    graph
}

/// Partition buses into sub-networks (breadth-first search over lines).
///
/// Sub-networks are numbered in order of their first bus.
pub fn sub_networks(network: &Network) -> Vec<SubNetwork> {
    let graph = bus_graph(network, false);
    let mut visited = HashSet::new();
    let mut seen_edges = HashSet::new();
    let mut islands = Vec::new();
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::from([start]);
        let mut members = Vec::new();
        let mut lines = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(graph[node]);
            for edge in graph.edges(node) {
                let next = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
                // Each edge is seen from both ends; keep it once.
                if seen_edges.insert(edge.id()) {
                    lines.push(edge.weight().clone());
                }
            }
        }
        members.sort_unstable();
        islands.push(SubNetwork {
            id: islands.len(),
            buses: members
                .into_iter()
                .map(|position| network.nodes()[position].id.clone())
                .collect(),
            lines,
        });
    }
    islands
}

/// Degree and connectivity statistics of the bus graph (lines and links).
pub fn graph_stats(network: &Network) -> GraphStats {
    let graph = bus_graph(network, true);
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.edges(node).count())
        .collect();
    let node_count = graph.node_count();
    GraphStats {
        node_count,
        edge_count: graph.edge_count(),
        sub_networks: connected_components(&graph),
        min_degree: degrees.iter().copied().min().unwrap_or(0),
        max_degree: degrees.iter().copied().max().unwrap_or(0),
        avg_degree: if node_count == 0 {
            0.0
        } else {
            degrees.iter().sum::<usize>() as f64 / node_count as f64
        },
    }
}

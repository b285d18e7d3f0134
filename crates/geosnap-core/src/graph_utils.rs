use crate::{Junction, NodeId, Road, RoadNetwork};
use petgraph::algo::connected_components;
use petgraph::visit::EdgeRef;
use std::collections::{HashSet, VecDeque};

/// Summary statistics of a road network (density/degree/weak components).
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// One weakly connected component.
#[derive(Debug)]
pub struct IslandSummary {
    pub island_id: usize,
    pub node_count: usize,
}

/// Island membership of one junction.
#[derive(Debug)]
pub struct NodeAssignment {
    pub junction: NodeId,
    pub island_id: usize,
}

#[derive(Debug)]
pub struct IslandAnalysis {
    pub islands: Vec<IslandSummary>,
    pub assignments: Vec<NodeAssignment>,
}

/// Degree counts both directions, so a two-way street contributes 2 to each end.
pub fn graph_stats(network: &RoadNetwork) -> GraphStats {
    let graph = &network.graph;
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors_undirected(node).count())
        .collect();
    let min_degree = degrees.iter().copied().min().unwrap_or(0);
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / node_count as f64
    };
    let density = if node_count < 2 {
        0.0
    } else {
        edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    };
    GraphStats {
        node_count,
        edge_count,
        connected_components: connected_components(graph),
        min_degree,
        avg_degree,
        max_degree,
        density,
    }
}

/// Labels weakly connected components by breadth-first search, ignoring
/// edge direction. Islands are numbered in order of their first junction.
pub fn find_islands(network: &RoadNetwork) -> IslandAnalysis {
    let graph = &network.graph;
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    let mut assignments = Vec::new();
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let island_id = islands.len();
        let mut queue = VecDeque::from([start]);
        let mut node_count = 0;
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            node_count += 1;
            assignments.push(NodeAssignment {
                junction: graph[node].id,
                island_id,
            });
            queue.extend(
                graph
                    .neighbors_undirected(node)
                    .filter(|neighbor| !visited.contains(neighbor)),
            );
        }
        islands.push(IslandSummary {
            island_id,
            node_count,
        });
    }
    assignments.sort_by_key(|assignment| assignment.junction);
    IslandAnalysis {
        islands,
        assignments,
    }
}

impl RoadNetwork {
    /// Copy of the network restricted to its largest weakly connected
    /// component. On equal sizes the island found first wins.
    ///
    /// Observations near small disconnected fragments (driveways, cut-off
    /// service roads) would otherwise snap to roads that are unreachable.
    pub fn largest_island(&self) -> RoadNetwork {
        let analysis = find_islands(self);
        let Some(largest) = analysis
            .islands
            .iter()
            .fold(None::<&IslandSummary>, |best, island| match best {
                Some(b) if b.node_count >= island.node_count => Some(b),
                _ => Some(island),
            })
        else {
            return RoadNetwork {
                crs: self.crs,
                ..RoadNetwork::default()
            };
        };
        let members: HashSet<NodeId> = analysis
            .assignments
            .iter()
            .filter(|a| a.island_id == largest.island_id)
            .map(|a| a.junction)
            .collect();

        let mut kept = RoadNetwork {
            crs: self.crs,
            ..RoadNetwork::default()
        };
        for junction in self.graph.node_weights() {
            if members.contains(&junction.id) {
                let Junction {
                    id,
                    coord,
                    attributes,
                } = junction.clone();
                let index = kept.add_junction(id, coord);
                kept.graph[index].attributes = attributes;
            }
        }
        for edge in self.graph.edge_references() {
            let road: &Road = edge.weight();
            if members.contains(&road.key.u) {
                // Keys are unique in the source network, so re-insertion cannot collide.
                let source = &self.graph[edge.source()];
                let target = &self.graph[edge.target()];
                let ui = kept.add_junction(source.id, source.coord);
                let vi = kept.add_junction(target.id, target.coord);
                kept.graph.add_edge(ui, vi, road.clone());
            }
        }
        kept
    }
}

use std::{cmp::Ordering, collections::BinaryHeap};

use fixedbitset::FixedBitSet;
use serde::Serialize;

use super::graph::{FloorGraph, NodeIndex};
use super::model::NodeKind;
use crate::Error;

#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    /// Insertion order, breaks cost ties first-in first-out
    seq: u64,
    node: NodeIndex,
}

impl Eq for State {}

// Implement Ord for State to use in BinaryHeap
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by cost (reversed from standard Rust BinaryHeap)
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered node ids from source to destination with the summed edge weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndoorPath {
    pub nodes: Vec<String>,
    /// Total length in floor-plan pixels
    pub cost: f64,
}

impl IndoorPath {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Floor-plan ratios of the path nodes, in path order
    pub fn positions(&self, graph: &FloorGraph) -> Vec<[f64; 2]> {
        self.nodes
            .iter()
            .filter_map(|id| graph.node_index(id))
            .map(|idx| {
                let node = graph.node(idx);
                [node.x, node.y]
            })
            .collect()
    }
}

struct Settled {
    target: NodeIndex,
    cost: f64,
    predecessors: Vec<Option<NodeIndex>>,
}

/// Runs Dijkstra from `start` until a node accepted by `is_target` is popped
fn dijkstra_until<F>(graph: &FloorGraph, start: NodeIndex, is_target: F) -> Option<Settled>
where
    F: Fn(NodeIndex) -> bool,
{
    let node_count = graph.node_count();
    let mut distances = vec![f64::INFINITY; node_count];
    let mut predecessors = vec![None; node_count];
    let mut visited = FixedBitSet::with_capacity(node_count);
    let mut heap = BinaryHeap::with_capacity(node_count);
    let mut seq = 0;

    distances[start] = 0.0;
    heap.push(State {
        cost: 0.0,
        seq,
        node: start,
    });

    while let Some(State { cost, node, .. }) = heap.pop() {
        // Stale heap entry for an already settled node
        if visited.contains(node) {
            continue;
        }
        visited.insert(node);

        if is_target(node) {
            return Some(Settled {
                target: node,
                cost,
                predecessors,
            });
        }

        for neighbor in graph.adjacent(node) {
            if visited.contains(neighbor.node) {
                continue;
            }
            let next_cost = cost + neighbor.weight;
            if next_cost < distances[neighbor.node] {
                distances[neighbor.node] = next_cost;
                predecessors[neighbor.node] = Some(node);
                seq += 1;
                heap.push(State {
                    cost: next_cost,
                    seq,
                    node: neighbor.node,
                });
            }
        }
    }

    None
}

fn reconstruct_path(graph: &FloorGraph, start: NodeIndex, settled: &Settled) -> IndoorPath {
    // Follow predecessors backward from target to start
    let mut node_path = vec![settled.target];
    let mut current = settled.target;
    while current != start {
        match settled.predecessors[current] {
            Some(prev) => {
                node_path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    node_path.reverse();

    IndoorPath {
        nodes: node_path
            .into_iter()
            .map(|idx| graph.node(idx).id.clone())
            .collect(),
        cost: settled.cost,
    }
}

/// Shortest walking path between two nodes of a floor
///
/// # Errors
///
/// Returns [`Error::UnknownNode`] if either id is missing from the graph and
/// [`Error::NoPathFound`] when the destination is unreachable.
pub fn shortest_path(
    graph: &FloorGraph,
    source: &str,
    destination: &str,
) -> Result<IndoorPath, Error> {
    let start = graph.require_index(source)?;
    let target = graph.require_index(destination)?;

    let settled =
        dijkstra_until(graph, start, |node| node == target).ok_or_else(|| Error::NoPathFound {
            from: source.to_string(),
            to: destination.to_string(),
        })?;

    Ok(reconstruct_path(graph, start, &settled))
}

/// Shortest path from `source` to the closest node of the given kind
///
/// # Errors
///
/// Returns [`Error::UnknownNode`] for an unknown source and
/// [`Error::NoPathFound`] when no node of that kind is reachable.
pub fn shortest_path_to_kind(
    graph: &FloorGraph,
    source: &str,
    kind: NodeKind,
) -> Result<IndoorPath, Error> {
    let start = graph.require_index(source)?;

    let settled = dijkstra_until(graph, start, |node| graph.node(node).kind == kind).ok_or_else(
        || Error::NoPathFound {
            from: source.to_string(),
            to: kind.to_string(),
        },
    )?;

    Ok(reconstruct_path(graph, start, &settled))
}

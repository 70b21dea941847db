//! Weighted walking graph for one floor.

use std::fmt;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use log::debug;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use super::model::{EdgeKind, FloorDefinition, Node};
use crate::Error;

/// Dense index of a node inside a [`FloorGraph`]
pub type NodeIndex = usize;

type IndexedPosition = GeomWithData<[f64; 2], NodeIndex>;

/// Outgoing half of an undirected edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub node: NodeIndex,
    /// Euclidean distance in floor-plan pixels
    pub weight: f64,
    pub kind: EdgeKind,
}

/// Read-only adjacency structure of a single floor.
///
/// Node ids are interned into dense indices at build time; the id-keyed
/// view is available through [`FloorGraph::neighbors`].
pub struct FloorGraph {
    name: String,
    width: f64,
    height: f64,
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
    adjacency: Vec<Vec<Neighbor>>,
    rtree: RTree<IndexedPosition>,
}

impl fmt::Debug for FloorGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloorGraph")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edge_count())
            .finish()
    }
}

/// Builds the walking graph of a floor
///
/// # Errors
///
/// Returns [`Error::UnknownNode`] if an edge references a node missing from the floor,
/// [`Error::DuplicateNode`] for repeated ids and [`Error::InvalidData`] for
/// positions or dimensions that cannot be placed on the floor plan.
pub fn build_graph(floor: &FloorDefinition) -> Result<FloorGraph, Error> {
    if !(floor.width > 0.0 && floor.height > 0.0) {
        return Err(Error::InvalidData(format!(
            "Floor {} has invalid dimensions {}x{}",
            floor.name, floor.width, floor.height
        )));
    }

    let mut index = HashMap::with_capacity(floor.nodes.len());
    for (idx, node) in floor.nodes.iter().enumerate() {
        if !(0.0..=1.0).contains(&node.x) || !(0.0..=1.0).contains(&node.y) {
            return Err(Error::InvalidData(format!(
                "Node {} lies outside the floor plan ({}, {})",
                node.id, node.x, node.y
            )));
        }
        match index.entry(node.id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(idx);
            }
            Entry::Occupied(_) => return Err(Error::DuplicateNode(node.id.clone())),
        }
    }

    let nodes = floor.nodes.clone();
    let pixel = |idx: NodeIndex| [nodes[idx].x * floor.width, nodes[idx].y * floor.height];

    let mut adjacency = vec![Vec::new(); nodes.len()];
    for edge in &floor.edges {
        let a = *index
            .get(edge.0.as_str())
            .ok_or_else(|| Error::UnknownNode(edge.0.clone()))?;
        let b = *index
            .get(edge.1.as_str())
            .ok_or_else(|| Error::UnknownNode(edge.1.clone()))?;

        let [ax, ay] = pixel(a);
        let [bx, by] = pixel(b);
        let weight = (ax - bx).hypot(ay - by);

        adjacency[a].push(Neighbor {
            node: b,
            weight,
            kind: edge.2,
        });
        adjacency[b].push(Neighbor {
            node: a,
            weight,
            kind: edge.2,
        });
    }

    let rtree = RTree::bulk_load(
        (0..nodes.len())
            .map(|idx| GeomWithData::new(pixel(idx), idx))
            .collect(),
    );

    debug!(
        "Built floor {} with {} nodes and {} edges",
        floor.name,
        nodes.len(),
        floor.edges.len()
    );

    Ok(FloorGraph {
        name: floor.name.clone(),
        width: floor.width,
        height: floor.height,
        nodes,
        index,
        adjacency,
        rtree,
    })
}

impl FloorGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx]
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub(crate) fn require_index(&self, id: &str) -> Result<NodeIndex, Error> {
        self.node_index(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    pub(crate) fn adjacent(&self, idx: NodeIndex) -> &[Neighbor] {
        &self.adjacency[idx]
    }

    /// Neighbors of `id` with their edge weights, `None` for an unknown id
    pub fn neighbors<'a>(
        &'a self,
        id: &str,
    ) -> Option<impl Iterator<Item = (&'a str, f64)> + use<'a>> {
        let idx = self.node_index(id)?;
        Some(
            self.adjacency[idx]
                .iter()
                .map(|n| (self.nodes[n.node].id.as_str(), n.weight)),
        )
    }

    /// Node closest to a position given as floor-plan ratios
    pub fn nearest_node(&self, x_ratio: f64, y_ratio: f64) -> Option<&Node> {
        let query = [x_ratio * self.width, y_ratio * self.height];
        self.rtree
            .nearest_neighbor(&query)
            .map(|entry| &self.nodes[entry.data])
    }
}

//! Indoor walking graphs built from floor plans, and shortest paths over them.

pub mod cache;
pub mod dijkstra;
pub mod graph;
pub mod model;

pub use cache::{BuildingCache, BuildingGraph};
pub use dijkstra::{IndoorPath, shortest_path, shortest_path_to_kind};
pub use graph::{FloorGraph, Neighbor, NodeIndex, build_graph};
pub use model::{EdgeDefinition, EdgeKind, FloorDefinition, FloorPlanCatalog, Node, NodeKind};

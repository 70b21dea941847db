//! Floor-plan definitions as they come from the static catalog.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Category of an indoor navigation node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Hallway,
    Room,
    Escalator,
    Elevator,
    Washroom,
    Fountain,
    Entrance,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Hallway => "hallway",
            NodeKind::Room => "room",
            NodeKind::Escalator => "escalator",
            NodeKind::Elevator => "elevator",
            NodeKind::Washroom => "washroom",
            NodeKind::Fountain => "fountain",
            NodeKind::Entrance => "entrance",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an indoor edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Stairs,
    Elevator,
    Hallway,
    Escalator,
}

/// Indoor navigation node. Position is stored as ratios of the floor-plan image size.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Node {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, x: f64, y: f64, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            kind,
        }
    }
}

/// Undirected edge between two node ids
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EdgeDefinition(pub String, pub String, pub EdgeKind);

impl EdgeDefinition {
    pub fn new(a: impl Into<String>, b: impl Into<String>, kind: EdgeKind) -> Self {
        Self(a.into(), b.into(), kind)
    }
}

/// One floor of a building
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FloorDefinition {
    pub name: String,
    /// Floor-plan width in pixels
    pub width: f64,
    /// Floor-plan height in pixels
    pub height: f64,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    /// Rendering asset, unused by the navigation core
    #[serde(default)]
    pub image: Option<String>,
}

/// Static mapping from building name to its ordered floors
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FloorPlanCatalog {
    pub buildings: BTreeMap<String, Vec<FloorDefinition>>,
}

impl FloorPlanCatalog {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a catalog from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid catalog
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to read floor plans '{}': {}", path.display(), e),
            )
        })?;
        Self::from_json_str(&contents)
    }

    pub fn floors(&self, building: &str) -> Option<&[FloorDefinition]> {
        self.buildings.get(building).map(Vec::as_slice)
    }

    pub fn building_names(&self) -> impl Iterator<Item = &str> {
        self.buildings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hashbrown::HashMap;
use log::info;
use rayon::prelude::*;

use super::graph::{FloorGraph, build_graph};
use super::model::{FloorDefinition, FloorPlanCatalog};
use crate::Error;

/// Walking graphs of every floor of one building
#[derive(Debug)]
pub struct BuildingGraph {
    name: String,
    floors: Vec<FloorGraph>,
}

impl BuildingGraph {
    /// Builds all floors of a building, in parallel
    ///
    /// # Errors
    ///
    /// Returns the first floor error, see [`build_graph`]
    pub fn build(name: &str, floors: &[FloorDefinition]) -> Result<Self, Error> {
        let floors = floors
            .par_iter()
            .map(build_graph)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            floors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn floors(&self) -> &[FloorGraph] {
        &self.floors
    }

    pub fn floor(&self, floor: &str) -> Result<&FloorGraph, Error> {
        self.floors
            .iter()
            .find(|graph| graph.name() == floor)
            .ok_or_else(|| Error::UnknownFloor {
                building: self.name.clone(),
                floor: floor.to_string(),
            })
    }
}

type BuildCell = Arc<Mutex<Option<Arc<BuildingGraph>>>>;

/// Process-wide memo of building graphs.
///
/// Each building is built at most once. The map lock is only held to find a
/// building's cell, so a slow build of one building never blocks lookups of
/// another; concurrent callers asking for the same building wait on its cell.
#[derive(Debug)]
pub struct BuildingCache {
    catalog: Arc<FloorPlanCatalog>,
    entries: Mutex<HashMap<String, BuildCell>>,
    builds: AtomicUsize,
}

impl BuildingCache {
    pub fn new(catalog: Arc<FloorPlanCatalog>) -> Self {
        Self {
            catalog,
            entries: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn catalog(&self) -> &FloorPlanCatalog {
        &self.catalog
    }

    fn cell(&self, name: &str) -> BuildCell {
        // Cells are only ever inserted whole, so a poisoned map is still consistent
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry_ref(name).or_default())
    }

    /// Returns the cached graphs of `name`, building them on first request
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBuilding`] if the catalog has no such building, or
    /// the build error of a malformed floor plan (which is not cached).
    pub fn get(&self, name: &str) -> Result<Arc<BuildingGraph>, Error> {
        let floors = self
            .catalog
            .floors(name)
            .ok_or_else(|| Error::UnknownBuilding(name.to_string()))?;

        let cell = self.cell(name);
        let mut slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have built it while we waited for the cell
        if let Some(graph) = slot.as_ref() {
            return Ok(Arc::clone(graph));
        }

        let graph = Arc::new(BuildingGraph::build(name, floors)?);
        self.builds.fetch_add(1, Ordering::Relaxed);
        info!(
            "Built indoor graph for {name}: {} floors, {} nodes",
            graph.floors.len(),
            graph.floors.iter().map(FloorGraph::node_count).sum::<usize>()
        );

        *slot = Some(Arc::clone(&graph));
        Ok(graph)
    }

    /// Builds every building of the catalog, failing on the first bad floor plan
    pub fn warm_all(&self) -> Result<usize, Error> {
        let names: Vec<String> = self.catalog.building_names().map(str::to_string).collect();
        for name in &names {
            self.get(name)?;
        }
        Ok(names.len())
    }

    /// Number of building graphs constructed so far
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Drops every cached graph
    pub fn reset(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.builds.store(0, Ordering::Relaxed);
    }
}

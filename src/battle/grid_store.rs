//! Sparse tile storage
//!
//! The store maps coordinates to tiles and records which unit stands where.
//! It never owns units; occupancy is a plain [`UnitId`] that the
//! orchestrator keeps in step with each unit's own grid index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::battle::layout::{TileLayout, WorldLayout};
use crate::battle::tile::{Tile, TileState, TileType};
use crate::battle::topology::Topology;
use crate::core::config::GridConfig;
use crate::core::types::UnitId;

/// Structural change reported by a store mutation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GridEvent {
    Generated,
    TileUpdated(GridIndex),
    TileHeightChanged { index: GridIndex, height: f32 },
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
pub struct GridStore {
    topology: Topology,
    tiles: AHashMap<GridIndex, Tile>,
    layout: Arc<dyn WorldLayout>,
    /// Process-unique stamp, renewed whenever tiles or occupancy change
    generation: u64,
}

impl GridStore {
    /// Empty grid; tiles are added with [`GridStore::add_tile`]
    pub fn new(topology: Topology, layout: Arc<dyn WorldLayout>) -> Self {
        Self {
            topology,
            tiles: AHashMap::new(),
            layout,
            generation: next_generation(),
        }
    }

    /// Rectangular grid of `Normal` tiles
    pub fn generate(
        topology: Topology,
        columns: i32,
        rows: i32,
        base_height: f32,
        layout: Arc<dyn WorldLayout>,
    ) -> Self {
        let mut grid = Self::new(topology, layout);
        for z in 0..rows {
            for x in 0..columns {
                grid.add_tile(GridIndex::new(x, z), TileType::Normal, base_height);
            }
        }
        grid
    }

    pub fn from_config(config: &GridConfig) -> Self {
        let layout = TileLayout::new(config.topology, config.tile_size);
        Self::generate(
            config.topology,
            config.columns,
            config.rows,
            config.base_height,
            Arc::new(layout),
        )
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn layout(&self) -> &dyn WorldLayout {
        self.layout.as_ref()
    }

    pub fn tile(&self, index: GridIndex) -> Option<&Tile> {
        self.tiles.get(&index)
    }

    /// Changes whenever anything a path search reads changes; state flags excluded
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_index_valid(&self, index: GridIndex) -> bool {
        self.tiles.contains_key(&index)
    }

    /// Walkable for ordinary ground movement
    pub fn is_walkable(&self, index: GridIndex) -> bool {
        self.tile(index)
            .map(|tile| tile.tile_type.is_walkable())
            .unwrap_or(false)
    }

    /// Whether the tile exists and its type is in `valid_types`
    pub fn is_tile_type_valid(&self, index: GridIndex, valid_types: &[TileType]) -> bool {
        self.tile(index)
            .map(|tile| valid_types.contains(&tile.tile_type))
            .unwrap_or(false)
    }

    pub fn occupant(&self, index: GridIndex) -> Option<UnitId> {
        self.tile(index).and_then(|tile| tile.occupant)
    }

    /// Every tile coordinate, sorted for deterministic iteration
    pub fn indexes(&self) -> Vec<GridIndex> {
        let mut indexes: Vec<GridIndex> = self.tiles.keys().copied().collect();
        indexes.sort();
        indexes
    }

    /// Neighbors that exist on this grid
    pub fn neighbors(&self, index: GridIndex) -> impl Iterator<Item = GridIndex> + '_ {
        self.topology
            .neighbors(index)
            .filter(move |neighbor| self.tiles.contains_key(neighbor))
    }

    pub fn world_position_of(&self, index: GridIndex) -> Option<Vec3> {
        self.tile(index).map(|tile| tile.world_position)
    }

    /// Tile under a world position, or `GridIndex::INVALID`
    pub fn index_of_world_position(&self, position: Vec3) -> GridIndex {
        let index = self.layout.grid_index_of(position);
        if self.is_index_valid(index) {
            index
        } else {
            GridIndex::INVALID
        }
    }

    /// Insert or replace a tile; an existing occupant is kept
    pub fn add_tile(&mut self, index: GridIndex, tile_type: TileType, height: f32) -> GridEvent {
        let position = self.layout.world_position_of(index, height);
        let occupant = self.occupant(index);
        let mut tile = Tile::new(index, tile_type, position);
        tile.occupant = occupant;
        self.tiles.insert(index, tile);
        self.generation = next_generation();
        GridEvent::TileUpdated(index)
    }

    pub fn remove_tile(&mut self, index: GridIndex) -> Option<GridEvent> {
        self.tiles.remove(&index)?;
        self.generation = next_generation();
        Some(GridEvent::TileUpdated(index))
    }

    pub fn set_tile_type(&mut self, index: GridIndex, tile_type: TileType) -> Option<GridEvent> {
        let tile = self.tiles.get_mut(&index)?;
        tile.tile_type = tile_type;
        self.generation = next_generation();
        Some(GridEvent::TileUpdated(index))
    }

    pub fn set_tile_height(&mut self, index: GridIndex, height: f32) -> Option<GridEvent> {
        let tile = self.tiles.get_mut(&index)?;
        tile.world_position.y = height;
        self.generation = next_generation();
        Some(GridEvent::TileHeightChanged { index, height })
    }

    /// Record `unit` as the tile's occupant; only the orchestrator calls this
    pub(crate) fn set_occupant(&mut self, index: GridIndex, unit: UnitId) -> bool {
        match self.tiles.get_mut(&index) {
            Some(tile) => {
                tile.occupant = Some(unit);
                self.generation = next_generation();
                true
            }
            None => false,
        }
    }

    /// Clear the occupant if it is `unit`
    pub(crate) fn clear_occupant(&mut self, index: GridIndex, unit: UnitId) {
        if let Some(tile) = self.tiles.get_mut(&index) {
            if tile.occupant == Some(unit) {
                tile.occupant = None;
                self.generation = next_generation();
            }
        }
    }

    pub fn add_state(&mut self, index: GridIndex, state: TileState) -> bool {
        self.tiles
            .get_mut(&index)
            .map(|tile| tile.states.insert(state))
            .unwrap_or(false)
    }

    pub fn remove_state(&mut self, index: GridIndex, state: TileState) -> bool {
        self.tiles
            .get_mut(&index)
            .map(|tile| tile.states.remove(state))
            .unwrap_or(false)
    }

    /// Clear a flag everywhere, returning the tiles that carried it
    pub fn clear_state(&mut self, state: TileState) -> Vec<GridIndex> {
        let mut cleared: Vec<GridIndex> = self
            .tiles
            .values_mut()
            .filter_map(|tile| tile.states.remove(state).then_some(tile.index))
            .collect();
        cleared.sort();
        cleared
    }

    pub fn indexes_with_state(&self, state: TileState) -> Vec<GridIndex> {
        let mut indexes: Vec<GridIndex> = self
            .tiles
            .values()
            .filter(|tile| tile.states.contains(state))
            .map(|tile| tile.index)
            .collect();
        indexes.sort();
        indexes
    }
}

//! Tile types, transient tile state flags and the tile record itself

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::core::types::UnitId;

/// Terrain class of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TileType {
    #[default]
    Normal,      // Walkable, cost 1
    Obstacle,    // Never walkable
    DoubleCost,  // Walkable, cost 2
    TripleCost,  // Walkable, cost 3
    FlyingOnly,  // Only for units that list it as valid
}

impl TileType {
    /// Movement cost multiplier for entering the tile
    pub fn movement_cost(&self) -> f32 {
        match self {
            TileType::Normal => 1.0,
            TileType::Obstacle => f32::INFINITY,
            TileType::DoubleCost => 2.0,
            TileType::TripleCost => 3.0,
            TileType::FlyingOnly => 1.0,
        }
    }

    /// Walkable for a unit with no special movement
    pub fn is_walkable(&self) -> bool {
        matches!(
            self,
            TileType::Normal | TileType::DoubleCost | TileType::TripleCost
        )
    }

    /// The tile types ordinary ground units may stand on
    pub fn ground() -> Vec<TileType> {
        vec![TileType::Normal, TileType::DoubleCost, TileType::TripleCost]
    }
}

/// Transient presentation flags carried by a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileState {
    Hovered,
    Selected,
    InPath,
    InMoveRange,
    InAbilityRange,
}

impl TileState {
    fn bit(self) -> u8 {
        match self {
            TileState::Hovered => 1,
            TileState::Selected => 1 << 1,
            TileState::InPath => 1 << 2,
            TileState::InMoveRange => 1 << 3,
            TileState::InAbilityRange => 1 << 4,
        }
    }
}

/// Set of [`TileState`] flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TileStates(u8);

impl TileStates {
    pub fn contains(&self, state: TileState) -> bool {
        self.0 & state.bit() != 0
    }

    /// Returns true if the flag was newly set
    pub fn insert(&mut self, state: TileState) -> bool {
        let was_set = self.contains(state);
        self.0 |= state.bit();
        !was_set
    }

    /// Returns true if the flag was present
    pub fn remove(&mut self, state: TileState) -> bool {
        let was_set = self.contains(state);
        self.0 &= !state.bit();
        was_set
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// A single tile of the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub index: GridIndex,
    pub tile_type: TileType,
    /// World position of the tile's top surface
    pub world_position: Vec3,
    pub occupant: Option<UnitId>,
    pub states: TileStates,
}

impl Tile {
    pub fn new(index: GridIndex, tile_type: TileType, world_position: Vec3) -> Self {
        Self {
            index,
            tile_type,
            world_position,
            occupant: None,
            states: TileStates::default(),
        }
    }

    pub fn height(&self) -> f32 {
        self.world_position.y
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_multipliers() {
        assert_eq!(TileType::Normal.movement_cost(), 1.0);
        assert_eq!(TileType::DoubleCost.movement_cost(), 2.0);
        assert_eq!(TileType::TripleCost.movement_cost(), 3.0);
        assert!(TileType::Obstacle.movement_cost().is_infinite());
    }

    #[test]
    fn test_flying_only_not_walkable_by_default() {
        assert!(!TileType::FlyingOnly.is_walkable());
        assert!(!TileType::Obstacle.is_walkable());
        assert!(TileType::TripleCost.is_walkable());
    }

    #[test]
    fn test_state_flags() {
        let mut states = TileStates::default();
        assert!(states.insert(TileState::InPath));
        assert!(!states.insert(TileState::InPath));
        assert!(states.insert(TileState::Hovered));
        assert!(states.contains(TileState::InPath));
        assert!(!states.contains(TileState::Selected));

        assert!(states.remove(TileState::InPath));
        assert!(!states.remove(TileState::InPath));
        assert!(!states.is_empty());
        states.remove(TileState::Hovered);
        assert!(states.is_empty());
    }
}

//! Combat units assembled from typed capabilities
//!
//! A unit holds its movement, health and ability system directly; nothing is
//! discovered at runtime. The orchestrator owns every unit and the grid only
//! refers to them by [`UnitId`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::battle::ability::{AbilityDef, AbilitySystem};
use crate::battle::constants::{DEFAULT_ACTION_POINTS, DEFAULT_MAX_HEALTH, DEFAULT_MOVE_RANGE};
use crate::battle::grid_index::GridIndex;
use crate::battle::movement::GridMovement;
use crate::battle::tile::TileType;
use crate::core::types::{TeamId, UnitId};

/// Static numbers describing a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitStats {
    pub max_health: i32,
    /// Movement cost the unit can cover for a normal move
    pub move_range: f32,
    pub action_points: u32,
    pub valid_tile_types: Vec<TileType>,
}

impl Default for UnitStats {
    fn default() -> Self {
        Self {
            max_health: DEFAULT_MAX_HEALTH,
            move_range: DEFAULT_MOVE_RANGE,
            action_points: DEFAULT_ACTION_POINTS,
            valid_tile_types: TileType::ground(),
        }
    }
}

impl UnitStats {
    /// Stats for a unit that may also cross `FlyingOnly` tiles
    pub fn flying() -> Self {
        let mut stats = Self::default();
        stats.valid_tile_types.push(TileType::FlyingOnly);
        stats
    }
}

/// Outcome of a health change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub previous: i32,
    pub current: i32,
    pub died: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Add `modifier`, clamped to `0..=max`
    pub fn apply(&mut self, modifier: i32) -> HealthChange {
        let previous = self.current;
        self.current = (self.current + modifier).clamp(0, self.max);
        HealthChange {
            previous,
            current: self.current,
            died: previous > 0 && self.current == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub stats: UnitStats,
    /// `GridIndex::INVALID` while off the grid
    pub grid_index: GridIndex,
    pub world_position: Vec3,
    pub team: Option<TeamId>,
    pub previous_team: Option<TeamId>,
    pub health: Health,
    pub movement: GridMovement,
    pub abilities: AbilitySystem,
}

impl Unit {
    pub fn new(name: impl Into<String>, stats: UnitStats, abilities: Vec<AbilityDef>) -> Self {
        let health = Health::new(stats.max_health);
        let ability_system = AbilitySystem::new(stats.action_points, abilities);
        Self {
            id: UnitId::new(),
            name: name.into(),
            stats,
            grid_index: GridIndex::INVALID,
            world_position: Vec3::ZERO,
            team: None,
            previous_team: None,
            health,
            movement: GridMovement::new(),
            abilities: ability_system,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    pub fn is_on_grid(&self) -> bool {
        !self.grid_index.is_invalid()
    }

    pub fn action_points(&self) -> u32 {
        self.abilities.action_points
    }

    pub fn can_stand_on(&self, tile_type: TileType) -> bool {
        self.stats.valid_tile_types.contains(&tile_type) && tile_type.movement_cost().is_finite()
    }

    /// Record a team change, remembering the old one
    pub fn set_team(&mut self, team: Option<TeamId>) {
        self.previous_team = self.team;
        self.team = team;
    }

    /// Called by the orchestrator when this unit's turn begins
    pub fn on_turn_started(&mut self) {
        self.abilities.reset_action_points();
    }

    /// Called by the orchestrator when combat ends
    pub fn on_combat_ended(&mut self) {
        self.movement.stop();
        self.abilities.reset_action_points();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_starts_off_grid() {
        let unit = Unit::new("Footman", UnitStats::default(), vec![]);
        assert!(!unit.is_on_grid());
        assert!(unit.is_alive());
        assert_eq!(unit.action_points(), DEFAULT_ACTION_POINTS);
        assert_eq!(unit.health.current, DEFAULT_MAX_HEALTH);
    }

    #[test]
    fn test_health_clamps_and_reports_death() {
        let mut health = Health::new(5);
        let change = health.apply(3);
        assert_eq!(change.current, 5);
        assert!(!change.died);

        let change = health.apply(-7);
        assert_eq!(change.current, 0);
        assert!(change.died);
        assert!(!health.is_alive());

        let change = health.apply(-1);
        assert!(!change.died);
    }

    #[test]
    fn test_team_change_remembers_previous() {
        let mut unit = Unit::new("Archer", UnitStats::default(), vec![]);
        unit.set_team(Some(TeamId(1)));
        unit.set_team(Some(TeamId(2)));
        assert_eq!(unit.team, Some(TeamId(2)));
        assert_eq!(unit.previous_team, Some(TeamId(1)));
    }

    #[test]
    fn test_flying_units_stand_on_flying_tiles() {
        let walker = Unit::new("Walker", UnitStats::default(), vec![]);
        let flyer = Unit::new("Flyer", UnitStats::flying(), vec![]);
        assert!(!walker.can_stand_on(TileType::FlyingOnly));
        assert!(flyer.can_stand_on(TileType::FlyingOnly));
        assert!(!flyer.can_stand_on(TileType::Obstacle));
    }

    #[test]
    fn test_turn_start_restores_action_points() {
        let mut unit = Unit::new("Footman", UnitStats::default(), vec![]);
        unit.abilities.remove_action_points(2);
        unit.on_turn_started();
        assert_eq!(unit.action_points(), DEFAULT_ACTION_POINTS);
    }
}

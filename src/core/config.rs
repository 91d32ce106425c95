//! Engine configuration with documented constants
//!
//! All tunable numbers live here. The orchestrator receives an
//! [`EngineConfig`] by value at construction; nothing reads global state.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::battle::topology::Topology;
use crate::core::error::{Result, TacticsError};

/// Top-level configuration, loadable from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub combat: CombatConfig,
    pub visibility: VisibilityConfig,
    /// Seed for ability effect rolls
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            combat: CombatConfig::default(),
            visibility: VisibilityConfig::default(),
            seed: 0,
        }
    }
}

/// Grid shape and world scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub topology: Topology,
    pub columns: i32,
    pub rows: i32,
    /// Edge-to-edge size of one tile in world units
    pub tile_size: f32,
    /// Height assigned to freshly generated tiles
    pub base_height: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            topology: Topology::Square,
            columns: 10,
            rows: 10,
            tile_size: 1.0,
            base_height: 0.0,
        }
    }
}

/// Turn economy and movement pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Action points charged for a move within the unit's move range
    pub move_cost: u32,
    /// Action points charged for a move beyond move range (a dash)
    pub dash_cost: u32,
    /// How far a dash may reach, as a multiple of move range
    pub dash_range_multiplier: f32,
    /// Tiles a moving unit advances per orchestrator tick
    ///
    /// Must be at least 1 or moves never finish.
    pub tiles_per_tick: u32,
    /// Cost multiplier for diagonal steps on square grids
    pub diagonal_multiplier: f32,
    /// Minimum distinct teams required to start combat
    pub min_teams: usize,
    /// Minimum units required to start combat
    pub min_units: usize,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            move_cost: 1,
            dash_cost: 2,
            dash_range_multiplier: 2.0,
            tiles_per_tick: 1,
            diagonal_multiplier: 1.0,
            min_teams: 2,
            min_units: 2,
        }
    }
}

/// Line-of-sight tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Eye height above the tile used when an ability does not specify one
    pub default_height: f32,
    /// Lateral offset (in tiles) of the four fallback rays
    pub corner_offset: f32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            default_height: 1.0,
            corner_offset: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate().map_err(TacticsError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.grid.columns <= 0 || self.grid.rows <= 0 {
            return Err("grid columns and rows must be positive".into());
        }
        if self.grid.tile_size <= 0.0 {
            return Err("grid.tile_size must be positive".into());
        }
        if self.combat.tiles_per_tick == 0 {
            return Err("combat.tiles_per_tick must be at least 1".into());
        }
        if self.combat.dash_range_multiplier < 1.0 {
            return Err("combat.dash_range_multiplier must be >= 1".into());
        }
        if self.combat.dash_cost < self.combat.move_cost {
            return Err("combat.dash_cost must not be cheaper than combat.move_cost".into());
        }
        if self.combat.diagonal_multiplier <= 0.0 {
            return Err("combat.diagonal_multiplier must be positive".into());
        }
        if self.combat.min_units < 1 || self.combat.min_teams < 1 {
            return Err("combat.min_units and combat.min_teams must be at least 1".into());
        }
        if self.visibility.corner_offset < 0.0 || self.visibility.corner_offset > 1.0 {
            return Err("visibility.corner_offset must be within [0, 1]".into());
        }
        Ok(())
    }
}

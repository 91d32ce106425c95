use thiserror::Error;

use crate::battle::grid_index::GridIndex;
use crate::core::types::UnitId;

#[derive(Error, Debug)]
pub enum TacticsError {
    #[error("Grid index {0} is not part of the grid")]
    InvalidIndex(GridIndex),

    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("Unit {0} is not placed on the grid")]
    UnitNotOnGrid(UnitId),

    #[error("Unit {0} is already in combat")]
    AlreadyInCombat(UnitId),

    #[error("Unit {0} is not in combat")]
    UnitNotInCombat(UnitId),

    #[error("Unit {0} is dead")]
    UnitDead(UnitId),

    #[error("Tile {0} is already occupied")]
    TileOccupied(GridIndex),

    #[error("Tile {index} cannot hold unit {unit}")]
    InvalidTileForUnit { unit: UnitId, index: GridIndex },

    #[error("Combat is not running")]
    NotInCombat,

    #[error("It is not unit {0}'s turn")]
    NotUnitsTurn(UnitId),

    #[error("Another move or ability is still pending")]
    ActionPending,

    #[error("Not enough action points: need {required}, have {available}")]
    InsufficientActionPoints { required: u32, available: u32 },

    #[error("Target {0} is out of range")]
    TargetOutOfRange(GridIndex),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unknown ability: {0}")]
    AbilityNotFound(String),

    #[error("Ability cannot be activated: {0}")]
    AbilityUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TacticsError>;

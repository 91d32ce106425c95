//! Battle system - turn-based tactics on square, hex and triangle grids
//!
//! Layers, bottom-up:
//! - Coordinates and topology: neighbor tables and step metrics per grid shape
//! - Grid store: tiles, occupancy and per-tile state flags
//! - Patterns and line of sight: which tiles an ability can reach
//! - Pathfinding: A* with per-unit tile permissions and blocking rules
//! - Orchestrator: turns, teams, action points, committed moves and abilities
//!
//! Only the orchestrator mutates occupancy. Everything else reads the grid.

pub mod ability;
pub mod constants;
pub mod events;
pub mod grid_index;
pub mod grid_store;
pub mod layout;
pub mod movement;
pub mod orchestrator;
pub mod path_query;
pub mod pathfinding;
pub mod pattern;
pub mod teams;
pub mod tile;
pub mod topology;
pub mod units;
pub mod visibility;

// Re-exports for convenient access
pub use ability::{
    AbilityDef, AbilityEffect, AbilityInstance, AbilityKind, AbilityPhase, AbilitySystem,
    Attribute, EffectTargets,
};
pub use constants::*;
pub use events::{CombatEvent, EventBus, EventKind, EventRecord};
pub use grid_index::GridIndex;
pub use grid_store::{GridEvent, GridStore};
pub use layout::{TileLayout, WorldLayout};
pub use movement::{GridMovement, MovementState, MovementStep};
pub use orchestrator::{CombatOrchestrator, CombatStartParams, PendingAction};
pub use path_query::PathQuery;
pub use pathfinding::{
    find_path, path_cost, reachable_indexes, step_cost, Blocking, PathParams, PathResult,
    PathfindingResult,
};
pub use pattern::{generate_pattern, AbilityRangeData, LineOfSight, PatternKind, RangeSpec};
pub use teams::Teams;
pub use tile::{Tile, TileState, TileStates, TileType};
pub use topology::{hex_distance, Topology};
pub use units::{Health, HealthChange, Unit, UnitStats};
pub use visibility::{
    filter_line_of_sight, has_line_of_sight, AabbOccluders, Occluder, OcclusionProvider, OpenSky,
    RayHit,
};

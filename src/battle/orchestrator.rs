//! Combat orchestrator - turn order, teams, action points and commits
//!
//! The orchestrator is the only writer of tile occupancy and tile state
//! flags. It accepts one committed action (move or ability) at a time and
//! charges action points only when that action completes.
//!
//! Action points are spent only while combat is running; before combat
//! starts units can be repositioned freely within their dash range.

use std::sync::Arc;

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::ability::{AbilityDef, AbilityInstance, AbilityKind, EffectTargets};
use crate::battle::events::{CombatEvent, EventBus};
use crate::battle::grid_index::GridIndex;
use crate::battle::grid_store::{GridEvent, GridStore};
use crate::battle::movement::MovementStep;
use crate::battle::pathfinding::{
    find_path, path_cost, reachable_indexes, Blocking, PathParams, PathResult, PathfindingResult,
};
use crate::battle::pattern::{generate_pattern, AbilityRangeData};
use crate::battle::teams::Teams;
use crate::battle::tile::{TileState, TileType};
use crate::battle::units::{Unit, UnitStats};
use crate::battle::visibility::{filter_line_of_sight, has_line_of_sight, OcclusionProvider};
use crate::core::config::EngineConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{TeamId, Tick, UnitId};

/// Which preconditions for starting combat hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStartParams {
    pub can_start_combat: bool,
    pub has_enough_units: bool,
    pub has_enough_teams: bool,
    pub is_not_in_combat: bool,
}

/// The single committed action awaiting completion
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Move { unit: UnitId, action_points: u32 },
    Ability(AbilityInstance),
}

#[derive(Debug)]
pub struct CombatOrchestrator {
    config: EngineConfig,
    grid: Arc<GridStore>,
    units: AHashMap<UnitId, Unit>,
    /// Turn order: the order units entered combat
    units_in_combat: Vec<UnitId>,
    teams: Teams,
    in_combat: bool,
    active_unit: Option<UnitId>,
    /// Turn slot to resume from when the active unit left combat
    resume_slot: usize,
    pending: Option<PendingAction>,
    bus: EventBus,
    rng: ChaCha8Rng,
    tick: Tick,
}

impl CombatOrchestrator {
    /// Build an orchestrator with a grid generated from the config
    pub fn new(config: EngineConfig) -> Result<Self> {
        let grid = GridStore::from_config(&config.grid);
        Self::with_grid(config, grid)
    }

    pub fn with_grid(config: EngineConfig, grid: GridStore) -> Result<Self> {
        config.validate().map_err(TacticsError::Config)?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            grid: Arc::new(grid),
            units: AHashMap::new(),
            units_in_combat: Vec::new(),
            teams: Teams::new(),
            in_combat: false,
            active_unit: None,
            resume_slot: 0,
            pending: None,
            bus: EventBus::new(),
            rng,
            tick: 0,
        })
    }

    // === Queries ===

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    /// Shared read-only copy of the grid for off-thread searches
    pub fn grid_snapshot(&self) -> Arc<GridStore> {
        Arc::clone(&self.grid)
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn units_in_combat(&self) -> &[UnitId] {
        &self.units_in_combat
    }

    pub fn teams(&self) -> &Teams {
        &self.teams
    }

    pub fn active_unit(&self) -> Option<UnitId> {
        self.active_unit
    }

    pub fn is_in_combat(&self) -> bool {
        self.in_combat
    }

    pub fn is_action_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Whether `unit` could stand on `index` right now
    pub fn is_valid_tile_for_unit(&self, unit: UnitId, index: GridIndex) -> bool {
        let Some(unit) = self.units.get(&unit) else {
            return false;
        };
        if !self.grid.is_tile_type_valid(index, &unit.stats.valid_tile_types) {
            return false;
        }
        self.grid.tile(index).map_or(false, |tile| {
            tile.tile_type.movement_cost().is_finite()
                && tile.occupant.map_or(true, |occupant| occupant == unit.id)
        })
    }

    fn grid_mut(&mut self) -> &mut GridStore {
        Arc::make_mut(&mut self.grid)
    }

    fn publish(&mut self, event: CombatEvent) {
        self.bus.publish(self.tick, event);
    }

    fn living_unit(&self, id: UnitId) -> Result<&Unit> {
        let unit = self.units.get(&id).ok_or(TacticsError::UnitNotFound(id))?;
        if !unit.is_alive() {
            return Err(TacticsError::UnitDead(id));
        }
        Ok(unit)
    }

    /// Shared checks before committing a move or an ability
    fn check_can_act(&self, id: UnitId) -> Result<&Unit> {
        let unit = self.living_unit(id)?;
        if !unit.is_on_grid() {
            return Err(TacticsError::UnitNotOnGrid(id));
        }
        if self.pending.is_some() {
            return Err(TacticsError::ActionPending);
        }
        if self.in_combat && self.active_unit != Some(id) {
            return Err(TacticsError::NotUnitsTurn(id));
        }
        Ok(unit)
    }

    // === Roster ===

    /// Create a unit off the grid and return its id
    pub fn spawn_unit(&mut self, name: impl Into<String>, stats: UnitStats, abilities: Vec<AbilityDef>) -> UnitId {
        self.insert_unit(Unit::new(name, stats, abilities))
    }

    pub fn insert_unit(&mut self, unit: Unit) -> UnitId {
        let id = unit.id;
        self.units.insert(id, unit);
        id
    }

    /// Place a unit on the grid and enter it into the turn order
    ///
    /// `team` of `None` keeps whatever team the unit already had.
    pub fn add_unit_to_combat(&mut self, id: UnitId, index: GridIndex, team: Option<TeamId>) -> Result<()> {
        let unit = self.living_unit(id)?;
        if self.units_in_combat.contains(&id) {
            return Err(TacticsError::AlreadyInCombat(id));
        }
        let tile = self.grid.tile(index).ok_or(TacticsError::InvalidIndex(index))?;
        if !unit.can_stand_on(tile.tile_type) {
            return Err(TacticsError::InvalidTileForUnit { unit: id, index });
        }
        if tile.occupant.is_some() {
            return Err(TacticsError::TileOccupied(index));
        }
        let world_position = tile.world_position;
        let team = team.or(unit.team);

        self.grid_mut().set_occupant(index, id);
        let previous_team = self.teams.assign(id, team);
        let Some(unit) = self.units.get_mut(&id) else {
            return Err(TacticsError::UnitNotFound(id));
        };
        let from = unit.grid_index;
        unit.grid_index = index;
        unit.world_position = world_position;
        let team_changed = unit.team != team;
        if team_changed {
            unit.set_team(team);
        }
        self.units_in_combat.push(id);

        tracing::debug!("Unit {} joined combat at {} on team {:?}", id, index, team);
        self.publish(CombatEvent::UnitAddedToCombat { unit: id, index });
        self.publish(CombatEvent::UnitGridIndexChanged { unit: id, from, to: index });
        if team_changed || previous_team != team {
            self.publish(CombatEvent::UnitTeamChanged {
                unit: id,
                previous: previous_team,
                current: team,
            });
        }
        Ok(())
    }

    /// Place a unit on whichever tile lies under a world position
    pub fn add_unit_to_combat_at_position(
        &mut self,
        id: UnitId,
        position: glam::Vec3,
        team: Option<TeamId>,
    ) -> Result<()> {
        let index = self.grid.index_of_world_position(position);
        if index.is_invalid() {
            return Err(TacticsError::InvalidIndex(self.grid.layout().grid_index_of(position)));
        }
        self.add_unit_to_combat(id, index, team)
    }

    /// Take a unit off the grid and out of the turn order; the unit itself is kept
    pub fn remove_unit_from_combat(&mut self, id: UnitId) -> Result<()> {
        if !self.units.contains_key(&id) {
            return Err(TacticsError::UnitNotFound(id));
        }
        let slot = self
            .units_in_combat
            .iter()
            .position(|unit| *unit == id)
            .ok_or(TacticsError::UnitNotInCombat(id))?;

        let owns_pending = match &self.pending {
            Some(PendingAction::Move { unit, .. }) => *unit == id,
            Some(PendingAction::Ability(instance)) => instance.caster == id,
            None => false,
        };
        if owns_pending {
            self.abandon_pending();
        }

        let from = self.units.get(&id).map(|unit| unit.grid_index).unwrap_or(GridIndex::INVALID);
        self.grid_mut().clear_occupant(from, id);
        let previous_team = self.teams.remove(id);
        if let Some(unit) = self.units.get_mut(&id) {
            unit.grid_index = GridIndex::INVALID;
            unit.movement.stop();
            unit.set_team(None);
        }
        self.units_in_combat.remove(slot);

        if self.active_unit == Some(id) {
            self.active_unit = None;
            self.resume_slot = slot;
            self.publish(CombatEvent::UnitTurnEnded { unit: id });
        } else if self.active_unit.is_none() && slot < self.resume_slot {
            // Everything after the removed slot shifted down by one
            self.resume_slot -= 1;
        }
        if self.resume_slot >= self.units_in_combat.len() {
            self.resume_slot = 0;
        }

        tracing::debug!("Unit {} left combat", id);
        self.publish(CombatEvent::UnitGridIndexChanged {
            unit: id,
            from,
            to: GridIndex::INVALID,
        });
        if previous_team.is_some() {
            self.publish(CombatEvent::UnitTeamChanged {
                unit: id,
                previous: previous_team,
                current: None,
            });
        }
        self.publish(CombatEvent::UnitRemovedFromCombat { unit: id });
        Ok(())
    }

    pub fn set_unit_team(&mut self, id: UnitId, team: Option<TeamId>) -> Result<()> {
        let unit = self.units.get_mut(&id).ok_or(TacticsError::UnitNotFound(id))?;
        if unit.team == team {
            return Ok(());
        }
        let previous = unit.team;
        unit.set_team(team);
        if self.units_in_combat.contains(&id) {
            self.teams.assign(id, team);
        }
        self.publish(CombatEvent::UnitTeamChanged {
            unit: id,
            previous,
            current: team,
        });
        Ok(())
    }

    // === Combat state machine ===

    pub fn can_start_combat(&self) -> CombatStartParams {
        let has_enough_units = self.units_in_combat.len() >= self.config.combat.min_units;
        let has_enough_teams = self.teams.non_empty_count() >= self.config.combat.min_teams;
        let is_not_in_combat = !self.in_combat;
        CombatStartParams {
            can_start_combat: has_enough_units && has_enough_teams && is_not_in_combat,
            has_enough_units,
            has_enough_teams,
            is_not_in_combat,
        }
    }

    /// Start combat and activate the first unit; check the returned flags
    pub fn start_combat(&mut self) -> CombatStartParams {
        let params = self.can_start_combat();
        if !params.can_start_combat {
            tracing::warn!("Cannot start combat: {:?}", params);
            return params;
        }

        self.in_combat = true;
        self.active_unit = None;
        self.resume_slot = 0;
        tracing::info!(
            "Combat started with {} units on {} teams",
            self.units_in_combat.len(),
            self.teams.non_empty_count()
        );
        self.publish(CombatEvent::CombatStarted);
        self.advance_turn();
        params
    }

    /// End the active unit's turn and begin the next one in order
    pub fn next_unit(&mut self) -> Result<Option<UnitId>> {
        if !self.in_combat {
            return Err(TacticsError::NotInCombat);
        }
        if self.pending.is_some() {
            return Err(TacticsError::ActionPending);
        }
        Ok(self.advance_turn())
    }

    fn advance_turn(&mut self) -> Option<UnitId> {
        let slot = match self.active_unit.take() {
            Some(current) => {
                self.publish(CombatEvent::UnitTurnEnded { unit: current });
                self.units_in_combat
                    .iter()
                    .position(|unit| *unit == current)
                    .map_or(self.resume_slot, |slot| slot + 1)
            }
            None => self.resume_slot,
        };

        if self.units_in_combat.is_empty() {
            return None;
        }
        let slot = slot % self.units_in_combat.len();
        let next = self.units_in_combat[slot];
        self.active_unit = Some(next);
        self.resume_slot = slot;
        if let Some(unit) = self.units.get_mut(&next) {
            unit.on_turn_started();
        }
        tracing::debug!("Turn passes to unit {}", next);
        self.publish(CombatEvent::UnitTurnStarted { unit: next });
        Some(next)
    }

    pub fn end_combat(&mut self) {
        if !self.in_combat {
            return;
        }
        if self.pending.is_some() {
            self.abandon_pending();
        }
        if let Some(current) = self.active_unit.take() {
            self.publish(CombatEvent::UnitTurnEnded { unit: current });
        }
        for id in &self.units_in_combat {
            if let Some(unit) = self.units.get_mut(id) {
                unit.on_combat_ended();
            }
        }
        self.in_combat = false;
        self.resume_slot = 0;
        tracing::info!("Combat ended");
        self.publish(CombatEvent::CombatEnded);
    }

    /// Drop the pending action without charging anything
    fn abandon_pending(&mut self) {
        match self.pending.take() {
            Some(PendingAction::Move { unit, .. }) => {
                if let Some(unit) = self.units.get_mut(&unit) {
                    unit.movement.stop();
                    if let Some(position) = self.grid.world_position_of(unit.grid_index) {
                        unit.world_position = position;
                    }
                }
            }
            Some(PendingAction::Ability(mut instance)) => {
                instance.cancel();
                tracing::debug!("Ability {} cancelled", instance.ability.name);
                self.publish(CombatEvent::AbilityActivationComplete {
                    unit: instance.caster,
                    ability: instance.ability.name,
                    success: false,
                });
            }
            None => {}
        }
    }

    // === Movement ===

    /// Search parameters for a unit's move, capped at its dash range
    pub fn movement_params(&self, unit: &Unit) -> PathParams {
        let combat = &self.config.combat;
        let can_dash = !self.in_combat || unit.abilities.has_action_points(combat.dash_cost);
        let can_move = !self.in_combat || unit.abilities.has_action_points(combat.move_cost);
        let max_cost = if can_dash {
            unit.stats.move_range * combat.dash_range_multiplier
        } else if can_move {
            unit.stats.move_range
        } else {
            0.0
        };
        PathParams {
            max_cost,
            mover: Some(unit.id),
            valid_tile_types: unit.stats.valid_tile_types.clone(),
            blocking: Blocking::Units(self.teams.enemies_of(unit.id)),
            allow_occupied_target: false,
            diagonal_multiplier: combat.diagonal_multiplier,
        }
    }

    pub fn find_path_for_unit(&self, id: UnitId, target: GridIndex) -> Result<PathfindingResult> {
        let unit = self.living_unit(id)?;
        if !unit.is_on_grid() {
            return Err(TacticsError::UnitNotOnGrid(id));
        }
        let params = self.movement_params(unit);
        Ok(find_path(&self.grid, unit.grid_index, target, &params))
    }

    /// Action points a move of `cost` would charge, or `None` beyond dash range
    pub fn move_cost_for(&self, unit: &Unit, cost: f32) -> Option<u32> {
        let combat = &self.config.combat;
        if cost <= unit.stats.move_range {
            Some(combat.move_cost)
        } else if cost <= unit.stats.move_range * combat.dash_range_multiplier {
            Some(combat.dash_cost)
        } else {
            None
        }
    }

    /// Commit a move along `path`, which must start at the unit's tile
    ///
    /// Occupancy moves to the destination immediately; action points are
    /// charged when the unit arrives. Returns the points that will be charged.
    pub fn move_unit(&mut self, id: UnitId, path: &[GridIndex]) -> Result<u32> {
        let unit = self.check_can_act(id)?;

        let (Some(&start), Some(&destination)) = (path.first(), path.last()) else {
            return Err(TacticsError::InvalidPath("path is empty".into()));
        };
        if path.len() < 2 {
            return Err(TacticsError::InvalidPath("path has no steps".into()));
        }
        if start != unit.grid_index {
            return Err(TacticsError::InvalidPath(format!(
                "path starts at {} but unit stands on {}",
                start, unit.grid_index
            )));
        }

        let params = self.movement_params(unit);
        let cost = path_cost(&self.grid, path, &params)
            .ok_or_else(|| TacticsError::InvalidPath("path contains an illegal step".into()))?;
        let blocked = path[1..path.len() - 1].iter().any(|index| {
            self.grid
                .occupant(*index)
                .map_or(false, |occupant| matches!(&params.blocking, Blocking::Units(units) if units.contains(&occupant)))
        });
        if blocked {
            return Err(TacticsError::InvalidPath("path crosses an enemy".into()));
        }

        if !self.is_valid_tile_for_unit(id, destination) {
            return Err(match self.grid.occupant(destination) {
                Some(_) => TacticsError::TileOccupied(destination),
                None => TacticsError::InvalidTileForUnit { unit: id, index: destination },
            });
        }

        let tier = self
            .move_cost_for(unit, cost)
            .ok_or(TacticsError::TargetOutOfRange(destination))?;
        let action_points = if self.in_combat { tier } else { 0 };
        if !unit.abilities.has_action_points(action_points) {
            return Err(TacticsError::InsufficientActionPoints {
                required: action_points,
                available: unit.action_points(),
            });
        }

        // Commit: both sides of occupancy change together.
        let grid = Arc::make_mut(&mut self.grid);
        grid.clear_occupant(start, id);
        grid.set_occupant(destination, id);
        if let Some(unit) = self.units.get_mut(&id) {
            unit.grid_index = destination;
            unit.movement.begin(path);
        }
        self.pending = Some(PendingAction::Move { unit: id, action_points });

        tracing::debug!(
            "Unit {} moving {} -> {} (cost {:.1}, {} AP)",
            id,
            start,
            destination,
            cost,
            action_points
        );
        self.publish(CombatEvent::UnitGridIndexChanged {
            unit: id,
            from: start,
            to: destination,
        });
        Ok(action_points)
    }

    /// Search for a path and commit it if one exists
    ///
    /// A failed search is returned as-is and changes nothing.
    pub fn request_move(&mut self, id: UnitId, target: GridIndex) -> Result<PathfindingResult> {
        let result = self.find_path_for_unit(id, target)?;
        if result.result == PathResult::Success {
            self.move_unit(id, &result.path)?;
        }
        Ok(result)
    }

    /// Signal that a moving unit has physically arrived
    pub fn finish_movement(&mut self, id: UnitId) -> Result<()> {
        match &self.pending {
            Some(PendingAction::Move { unit, action_points }) if *unit == id => {
                let action_points = *action_points;
                if let Some(unit) = self.units.get_mut(&id) {
                    unit.movement.finish();
                }
                self.complete_move(id, action_points);
                Ok(())
            }
            _ => Err(TacticsError::InvalidPath(format!("unit {} is not moving", id))),
        }
    }

    fn complete_move(&mut self, id: UnitId, action_points: u32) {
        self.pending = None;
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        unit.abilities.remove_action_points(action_points);
        let index = unit.grid_index;
        if let Some(position) = self.grid.world_position_of(index) {
            unit.world_position = position;
        }
        self.publish(CombatEvent::UnitReachedDestination { unit: id, index });
    }

    /// Flag every tile the unit could move to this turn
    pub fn show_move_range(&mut self, id: UnitId) -> Result<Vec<GridIndex>> {
        let unit = self.living_unit(id)?;
        if !unit.is_on_grid() {
            return Err(TacticsError::UnitNotOnGrid(id));
        }
        let params = self.movement_params(unit);
        let reachable = reachable_indexes(&self.grid, unit.grid_index, &params);

        let grid = self.grid_mut();
        grid.clear_state(TileState::InMoveRange);
        for index in &reachable {
            grid.add_state(*index, TileState::InMoveRange);
        }
        Ok(reachable)
    }

    /// Replace the `InPath` flags with a previewed path
    pub fn apply_path_preview(&mut self, result: &PathfindingResult) {
        let grid = self.grid_mut();
        grid.clear_state(TileState::InPath);
        if result.is_success() {
            for index in &result.path {
                grid.add_state(*index, TileState::InPath);
            }
        }
    }

    /// Move the `Hovered` flag to `index`
    pub fn hover_tile(&mut self, index: GridIndex) {
        let grid = self.grid_mut();
        grid.clear_state(TileState::Hovered);
        grid.add_state(index, TileState::Hovered);
    }

    pub fn clear_tile_states(&mut self, state: TileState) -> Vec<GridIndex> {
        self.grid_mut().clear_state(state)
    }

    // === Abilities ===

    pub fn has_line_of_sight(
        &self,
        origin: GridIndex,
        target: GridIndex,
        height: f32,
        occlusion: &dyn OcclusionProvider,
    ) -> bool {
        has_line_of_sight(
            &self.grid,
            occlusion,
            origin,
            target,
            height,
            self.config.visibility.corner_offset,
        )
    }

    /// Pattern cells from `origin`, minus non-walkable tiles and, if asked, tiles out of sight
    pub fn ability_range(
        &self,
        origin: GridIndex,
        range: &AbilityRangeData,
        occlusion: &dyn OcclusionProvider,
    ) -> Vec<GridIndex> {
        let cells: Vec<GridIndex> = generate_pattern(origin, self.grid.topology(), range.range, range.pattern)
            .into_iter()
            .filter(|index| self.grid.is_walkable(*index))
            .collect();
        match range.line_of_sight {
            Some(sight) => filter_line_of_sight(
                &self.grid,
                occlusion,
                origin,
                cells,
                sight.height,
                self.config.visibility.corner_offset,
            ),
            None => cells,
        }
    }

    /// Flag the tiles a unit's ability can target
    pub fn show_ability_range(
        &mut self,
        id: UnitId,
        ability: &str,
        occlusion: &dyn OcclusionProvider,
    ) -> Result<Vec<GridIndex>> {
        let unit = self.living_unit(id)?;
        let def = unit
            .abilities
            .ability(ability)
            .ok_or_else(|| TacticsError::AbilityNotFound(ability.to_string()))?;
        let cells = self.ability_range(unit.grid_index, &def.range, occlusion);

        let grid = self.grid_mut();
        grid.clear_state(TileState::InAbilityRange);
        for index in &cells {
            grid.add_state(*index, TileState::InAbilityRange);
        }
        Ok(cells)
    }

    /// Validate and commit an ability activation against `target`
    ///
    /// Nothing is charged here; the cost is taken when the activation
    /// completes on a later [`tick`](Self::tick).
    pub fn try_activate_ability(
        &mut self,
        id: UnitId,
        ability: &str,
        target: GridIndex,
        occlusion: &dyn OcclusionProvider,
    ) -> Result<()> {
        let unit = self.check_can_act(id)?;
        let def = unit
            .abilities
            .ability(ability)
            .ok_or_else(|| TacticsError::AbilityNotFound(ability.to_string()))?
            .clone();

        if self.in_combat && !unit.abilities.has_action_points(def.cost) {
            return Err(TacticsError::InsufficientActionPoints {
                required: def.cost,
                available: unit.action_points(),
            });
        }

        let origin = unit.grid_index;
        if !self.ability_range(origin, &def.range, occlusion).contains(&target) {
            return Err(TacticsError::TargetOutOfRange(target));
        }

        if let AbilityKind::Summon { .. } = &def.kind {
            if self.grid.occupant(target).is_some() {
                return Err(TacticsError::AbilityUnavailable(format!(
                    "summon target {} is occupied",
                    target
                )));
            }
        }

        let impact = self.ability_range(target, &def.area_of_effect, occlusion);
        tracing::debug!("Unit {} activates {} at {}", id, def.name, target);
        self.pending = Some(PendingAction::Ability(AbilityInstance::new(
            id, def, origin, target, impact,
        )));
        Ok(())
    }

    /// Cancel the pending ability, if any, without charging for it
    pub fn cancel_ability(&mut self) -> bool {
        if matches!(self.pending, Some(PendingAction::Ability(_))) {
            self.abandon_pending();
            true
        } else {
            false
        }
    }

    fn resolve_ability(&mut self, instance: AbilityInstance) {
        let caster = instance.caster;
        let success = match &instance.ability.kind {
            AbilityKind::Strike => {
                self.apply_effects(&instance);
                true
            }
            AbilityKind::Summon { name, stats } => {
                let team = self.teams.team_of(caster);
                let summoned = self.spawn_unit(name.clone(), stats.clone(), Vec::new());
                match self.add_unit_to_combat(summoned, instance.target, team) {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::warn!("Summon failed: {}", error);
                        self.units.remove(&summoned);
                        false
                    }
                }
            }
        };

        if success && self.in_combat {
            if let Some(unit) = self.units.get_mut(&caster) {
                unit.abilities.remove_action_points(instance.ability.cost);
            }
        }
        self.publish(CombatEvent::AbilityActivationComplete {
            unit: caster,
            ability: instance.ability.name,
            success,
        });
    }

    fn apply_effects(&mut self, instance: &AbilityInstance) {
        let caster = instance.caster;
        for index in &instance.impact {
            let Some(target) = self.grid.occupant(*index) else {
                continue;
            };
            let allied = target == caster || self.teams.are_allies(caster, target);
            for effect in &instance.ability.effects {
                let applies = match effect.targets {
                    EffectTargets::Enemies => !allied,
                    EffectTargets::Allies => allied,
                    EffectTargets::All => true,
                };
                if !applies {
                    continue;
                }
                let modifier = effect.roll(&mut self.rng);
                let Some(unit) = self.units.get_mut(&target) else {
                    continue;
                };
                if !unit.is_alive() {
                    continue;
                }
                let change = unit.health.apply(modifier);
                self.publish(CombatEvent::UnitHealthChanged {
                    unit: target,
                    previous: change.previous,
                    current: change.current,
                });
                if change.died {
                    self.handle_death(target);
                }
            }
        }
    }

    fn handle_death(&mut self, id: UnitId) {
        tracing::info!("Unit {} died", id);
        self.publish(CombatEvent::UnitDied { unit: id });
        if let Err(error) = self.remove_unit_from_combat(id) {
            tracing::warn!("Could not remove dead unit {}: {}", id, error);
        }
    }

    // === Tick ===

    /// Advance movement and pending abilities by one step
    pub fn tick(&mut self) {
        self.tick += 1;
        match self.pending.take() {
            Some(PendingAction::Move { unit: id, action_points }) => {
                let steps = self.config.combat.tiles_per_tick;
                let step = match self.units.get_mut(&id) {
                    Some(unit) => unit.movement.advance(steps),
                    None => MovementStep::Idle,
                };
                match step {
                    MovementStep::Travelling(at) => {
                        if let (Some(unit), Some(position)) =
                            (self.units.get_mut(&id), self.grid.world_position_of(at))
                        {
                            unit.world_position = position;
                        }
                        self.pending = Some(PendingAction::Move { unit: id, action_points });
                    }
                    MovementStep::Arrived(_) | MovementStep::Idle => {
                        self.complete_move(id, action_points);
                    }
                }
            }
            Some(PendingAction::Ability(mut instance)) => {
                if instance.tick() {
                    self.resolve_ability(instance);
                } else {
                    self.pending = Some(PendingAction::Ability(instance));
                }
            }
            None => {}
        }
    }

    /// Tick until nothing is pending
    pub fn settle(&mut self) {
        while self.pending.is_some() {
            self.tick();
        }
    }

    // === Grid changes ===

    /// Swap in a new grid and re-place every unit in combat
    ///
    /// Units whose tile no longer exists or cannot hold them leave combat.
    pub fn regenerate_grid(&mut self, grid: GridStore) {
        self.grid = Arc::new(grid);
        self.handle_grid_event(GridEvent::Generated);
    }

    pub fn set_tile_type(&mut self, index: GridIndex, tile_type: TileType) -> Result<()> {
        let event = self
            .grid_mut()
            .set_tile_type(index, tile_type)
            .ok_or(TacticsError::InvalidIndex(index))?;
        self.handle_grid_event(event);
        Ok(())
    }

    pub fn set_tile_height(&mut self, index: GridIndex, height: f32) -> Result<()> {
        let event = self
            .grid_mut()
            .set_tile_height(index, height)
            .ok_or(TacticsError::InvalidIndex(index))?;
        self.handle_grid_event(event);
        Ok(())
    }

    pub fn remove_tile(&mut self, index: GridIndex) -> Result<()> {
        let event = self
            .grid_mut()
            .remove_tile(index)
            .ok_or(TacticsError::InvalidIndex(index))?;
        self.handle_grid_event(event);
        Ok(())
    }

    fn handle_grid_event(&mut self, event: GridEvent) {
        match event {
            GridEvent::Generated => {
                self.publish(CombatEvent::GridGenerated);
                let roster = self.units_in_combat.clone();
                for id in roster {
                    let index = self.units.get(&id).map(|unit| unit.grid_index).unwrap_or(GridIndex::INVALID);
                    let fits = self.is_valid_tile_for_unit(id, index);
                    if fits {
                        let position = self.grid.world_position_of(index);
                        self.grid_mut().set_occupant(index, id);
                        if let (Some(unit), Some(position)) = (self.units.get_mut(&id), position) {
                            unit.world_position = position;
                        }
                    } else {
                        self.evict(id, index);
                    }
                }
            }
            GridEvent::TileUpdated(index) => {
                self.publish(CombatEvent::TileUpdated { index });
                if let Some(id) = self.occupant_in_roster(index) {
                    if !self.is_valid_tile_for_unit(id, index) {
                        self.evict(id, index);
                    }
                }
            }
            GridEvent::TileHeightChanged { index, height } => {
                self.publish(CombatEvent::TileHeightChanged { index, height });
                if let Some(id) = self.occupant_in_roster(index) {
                    if let Some(unit) = self.units.get_mut(&id) {
                        if !unit.movement.is_moving() {
                            unit.world_position.y = height;
                        }
                    }
                }
            }
        }
    }

    /// The unit recorded on `index`, found from the unit side
    ///
    /// Removed tiles no longer carry an occupant, so the roster is the source here.
    fn occupant_in_roster(&self, index: GridIndex) -> Option<UnitId> {
        self.units_in_combat
            .iter()
            .copied()
            .find(|id| self.units.get(id).map_or(false, |unit| unit.grid_index == index))
    }

    fn evict(&mut self, id: UnitId, index: GridIndex) {
        tracing::warn!("Unit {} no longer fits tile {}, removing from combat", id, index);
        if let Err(error) = self.remove_unit_from_combat(id) {
            tracing::warn!("Could not remove unit {}: {}", id, error);
        }
    }
}

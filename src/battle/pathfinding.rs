//! A* pathfinding over the grid store
//!
//! Respects tile costs, per-unit tile permissions and occupancy rules.
//! Frontier ties break on lowest heuristic, then first inserted, so equal
//! inputs always produce the same path.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::battle::grid_store::GridStore;
use crate::battle::tile::TileType;
use crate::battle::topology::Topology;
use crate::core::types::UnitId;

/// Which occupied tiles the mover may not pass through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Blocking {
    /// Occupancy is ignored except at the destination
    None,
    /// Any unit other than the mover blocks
    #[default]
    AllOthers,
    /// Only the listed units block (typically enemies)
    Units(AHashSet<UnitId>),
}

impl Blocking {
    fn blocks(&self, occupant: UnitId) -> bool {
        match self {
            Blocking::None => false,
            Blocking::AllOthers => true,
            Blocking::Units(units) => units.contains(&occupant),
        }
    }
}

/// Search parameters; plain data so it can travel to a worker thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathParams {
    /// Searches give up on routes costing more than this
    pub max_cost: f32,
    /// The moving unit; its own tile never blocks it
    pub mover: Option<UnitId>,
    pub valid_tile_types: Vec<TileType>,
    pub blocking: Blocking,
    /// Permit ending on a tile another unit stands on
    pub allow_occupied_target: bool,
    /// Cost multiplier for diagonal steps on square grids
    pub diagonal_multiplier: f32,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            max_cost: f32::INFINITY,
            mover: None,
            valid_tile_types: TileType::ground(),
            blocking: Blocking::AllOthers,
            allow_occupied_target: false,
            diagonal_multiplier: 1.0,
        }
    }
}

impl PathParams {
    pub fn with_max_cost(mut self, max_cost: f32) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_mover(mut self, mover: UnitId) -> Self {
        self.mover = Some(mover);
        self
    }

    pub fn with_blocking(mut self, blocking: Blocking) -> Self {
        self.blocking = blocking;
        self
    }

    /// Whether the tile type may be entered at all
    fn permits(&self, tile_type: TileType) -> bool {
        self.valid_tile_types.contains(&tile_type) && tile_type.movement_cost().is_finite()
    }

    fn is_other(&self, occupant: Option<UnitId>) -> Option<UnitId> {
        occupant.filter(|unit| Some(*unit) != self.mover)
    }
}

/// Outcome of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathResult {
    Success,
    SearchFail,
    NoPathNeeded,
}

/// Path from origin to target, both inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathfindingResult {
    pub result: PathResult,
    pub path: Vec<GridIndex>,
    pub cost: f32,
}

impl PathfindingResult {
    pub fn fail() -> Self {
        Self {
            result: PathResult::SearchFail,
            path: Vec::new(),
            cost: f32::INFINITY,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == PathResult::Success
    }

    pub fn destination(&self) -> Option<GridIndex> {
        self.path.last().copied()
    }
}

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    index: GridIndex,
    g_cost: f32,
    f_cost: OrderedFloat<f32>,
    h_cost: OrderedFloat<f32>,
    sequence: u64,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        (other.f_cost, other.h_cost, other.sequence).cmp(&(self.f_cost, self.h_cost, self.sequence))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost of stepping from `from` into `to`, or `None` if the step is not allowed
///
/// Occupancy of `to` is not considered here.
pub fn step_cost(grid: &GridStore, from: GridIndex, to: GridIndex, params: &PathParams) -> Option<f32> {
    let tile = grid.tile(to)?;
    if !params.permits(tile.tile_type) {
        return None;
    }
    let mut cost = tile.tile_type.movement_cost();
    if grid.topology().is_diagonal_step(from, to) {
        cost *= params.diagonal_multiplier;
    }
    Some(cost)
}

/// Cheapest possible single step, for scaling the heuristic
fn min_step_cost(grid: &GridStore, params: &PathParams) -> f32 {
    let cheapest_tile = params
        .valid_tile_types
        .iter()
        .map(|tile_type| tile_type.movement_cost())
        .filter(|cost| cost.is_finite())
        .fold(f32::INFINITY, f32::min);
    let cheapest_tile = if cheapest_tile.is_finite() { cheapest_tile } else { 1.0 };
    let diagonal = match grid.topology() {
        Topology::Square => params.diagonal_multiplier.min(1.0),
        _ => 1.0,
    };
    cheapest_tile * diagonal
}

fn can_pass(grid: &GridStore, index: GridIndex, params: &PathParams) -> bool {
    match params.is_other(grid.occupant(index)) {
        Some(occupant) => !params.blocking.blocks(occupant),
        None => true,
    }
}

fn can_end_on(grid: &GridStore, index: GridIndex, params: &PathParams) -> bool {
    params.allow_occupied_target || params.is_other(grid.occupant(index)).is_none()
}

/// Find the cheapest path using A*
pub fn find_path(
    grid: &GridStore,
    origin: GridIndex,
    target: GridIndex,
    params: &PathParams,
) -> PathfindingResult {
    if origin == target {
        return PathfindingResult {
            result: PathResult::NoPathNeeded,
            path: vec![origin],
            cost: 0.0,
        };
    }

    if !grid.is_index_valid(origin) {
        return PathfindingResult::fail();
    }
    match grid.tile(target) {
        Some(tile) if params.permits(tile.tile_type) && can_end_on(grid, target, params) => {}
        _ => return PathfindingResult::fail(),
    }

    let topology = grid.topology();
    let scale = min_step_cost(grid, params);
    let heuristic = |index: GridIndex| topology.step_distance(index, target) as f32 * scale;

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<GridIndex, GridIndex> = AHashMap::new();
    let mut g_scores: AHashMap<GridIndex, f32> = AHashMap::new();
    let mut closed: AHashSet<GridIndex> = AHashSet::new();
    let mut sequence = 0u64;

    g_scores.insert(origin, 0.0);
    let h = heuristic(origin);
    open_set.push(PathNode {
        index: origin,
        g_cost: 0.0,
        f_cost: OrderedFloat(h),
        h_cost: OrderedFloat(h),
        sequence,
    });

    while let Some(current) = open_set.pop() {
        if current.index == target {
            return PathfindingResult {
                result: PathResult::Success,
                path: reconstruct_path(&came_from, target),
                cost: current.g_cost,
            };
        }
        if !closed.insert(current.index) {
            continue;
        }

        for neighbor in grid.neighbors(current.index) {
            if closed.contains(&neighbor) {
                continue;
            }
            let Some(cost) = step_cost(grid, current.index, neighbor, params) else {
                continue;
            };
            if neighbor != target && !can_pass(grid, neighbor, params) {
                continue;
            }

            let tentative_g = current.g_cost + cost;
            if tentative_g > params.max_cost {
                continue;
            }
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY);
            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.index);
                g_scores.insert(neighbor, tentative_g);

                sequence += 1;
                let h = heuristic(neighbor);
                open_set.push(PathNode {
                    index: neighbor,
                    g_cost: tentative_g,
                    f_cost: OrderedFloat(tentative_g + h),
                    h_cost: OrderedFloat(h),
                    sequence,
                });
            }
        }
    }

    PathfindingResult::fail()
}

/// Reconstruct path from came_from map
fn reconstruct_path(came_from: &AHashMap<GridIndex, GridIndex>, mut current: GridIndex) -> Vec<GridIndex> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Total cost of walking a path, `None` if any step is illegal
pub fn path_cost(grid: &GridStore, path: &[GridIndex], params: &PathParams) -> Option<f32> {
    path.windows(2)
        .map(|step| {
            let adjacent = grid.topology().neighbors(step[0]).any(|n| n == step[1]);
            if adjacent {
                step_cost(grid, step[0], step[1], params)
            } else {
                None
            }
        })
        .sum()
}

/// Every tile the mover could end a move on within `params.max_cost`
///
/// Sorted; the origin itself is excluded.
pub fn reachable_indexes(grid: &GridStore, origin: GridIndex, params: &PathParams) -> Vec<GridIndex> {
    if !grid.is_index_valid(origin) {
        return Vec::new();
    }

    let mut open_set = BinaryHeap::new();
    let mut g_scores: AHashMap<GridIndex, f32> = AHashMap::new();
    let mut sequence = 0u64;

    g_scores.insert(origin, 0.0);
    open_set.push(PathNode {
        index: origin,
        g_cost: 0.0,
        f_cost: OrderedFloat(0.0),
        h_cost: OrderedFloat(0.0),
        sequence,
    });

    while let Some(current) = open_set.pop() {
        if current.g_cost > *g_scores.get(&current.index).unwrap_or(&f32::INFINITY) {
            continue;
        }
        for neighbor in grid.neighbors(current.index) {
            let Some(cost) = step_cost(grid, current.index, neighbor, params) else {
                continue;
            };
            if !can_pass(grid, neighbor, params) {
                continue;
            }
            let tentative_g = current.g_cost + cost;
            if tentative_g > params.max_cost {
                continue;
            }
            if tentative_g < *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY) {
                g_scores.insert(neighbor, tentative_g);
                sequence += 1;
                open_set.push(PathNode {
                    index: neighbor,
                    g_cost: tentative_g,
                    f_cost: OrderedFloat(tentative_g),
                    h_cost: OrderedFloat(0.0),
                    sequence,
                });
            }
        }
    }

    let mut reachable: Vec<GridIndex> = g_scores
        .into_keys()
        .filter(|index| *index != origin && can_end_on(grid, *index, params))
        .collect();
    reachable.sort();
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GridConfig;

    fn grid(topology: Topology) -> GridStore {
        GridStore::from_config(&GridConfig {
            topology,
            ..GridConfig::default()
        })
    }

    #[test]
    fn test_pathfind_straight_line() {
        let grid = grid(Topology::Square);
        let start = GridIndex::new(0, 0);
        let goal = GridIndex::new(5, 0);

        let result = find_path(&grid, start, goal, &PathParams::default());

        assert!(result.is_success());
        assert_eq!(result.path.first(), Some(&start));
        assert_eq!(result.path.last(), Some(&goal));
        assert_eq!(result.path.len(), 6);
        assert_eq!(result.cost, 5.0);
    }

    #[test]
    fn test_square_uses_diagonals() {
        let grid = grid(Topology::Square);
        let result = find_path(&grid, GridIndex::new(0, 0), GridIndex::new(4, 3), &PathParams::default());
        assert_eq!(result.path.len(), 5);
    }

    #[test]
    fn test_diagonal_multiplier_prefers_orthogonal() {
        let grid = grid(Topology::Square);
        let params = PathParams {
            diagonal_multiplier: 3.0,
            ..PathParams::default()
        };
        let result = find_path(&grid, GridIndex::new(0, 0), GridIndex::new(1, 1), &params);
        assert!(result.is_success());
        assert_eq!(result.cost, 2.0);
        assert_eq!(result.path.len(), 3);
    }

    #[test]
    fn test_pathfind_around_obstacle() {
        let mut grid = grid(Topology::Hexagon);
        grid.set_tile_type(GridIndex::new(2, 0), TileType::Obstacle);
        grid.set_tile_type(GridIndex::new(3, 0), TileType::Obstacle);

        let start = GridIndex::new(0, 0);
        let goal = GridIndex::new(5, 0);
        let result = find_path(&grid, start, goal, &PathParams::default());

        assert!(result.is_success());
        assert!(!result.path.contains(&GridIndex::new(2, 0)));
        assert!(result.path.len() > 6);
    }

    #[test]
    fn test_expensive_tiles_avoided() {
        let mut grid = grid(Topology::Square);
        for z in 0..3 {
            grid.set_tile_type(GridIndex::new(2, z), TileType::TripleCost);
        }
        let result = find_path(&grid, GridIndex::new(0, 1), GridIndex::new(4, 1), &PathParams::default());
        assert!(result.is_success());
        assert_eq!(result.cost, 4.0);
        assert!(result.path.contains(&GridIndex::new(2, 3)));
    }

    #[test]
    fn test_pathfind_same_start_goal() {
        let grid = grid(Topology::Triangle);
        let start = GridIndex::new(5, 5);
        let result = find_path(&grid, start, start, &PathParams::default());
        assert_eq!(result.result, PathResult::NoPathNeeded);
        assert_eq!(result.path, vec![start]);
        assert_eq!(result.cost, 0.0);
    }

    #[test]
    fn test_pathfind_no_path() {
        let mut grid = grid(Topology::Square);
        let goal = GridIndex::new(5, 5);
        for neighbor in Topology::Square.neighbors(goal) {
            grid.set_tile_type(neighbor, TileType::Obstacle);
        }
        let result = find_path(&grid, GridIndex::new(0, 0), goal, &PathParams::default());
        assert_eq!(result.result, PathResult::SearchFail);
        assert!(result.path.is_empty());
    }

    #[test]
    fn test_max_cost_caps_search() {
        let grid = grid(Topology::Square);
        let params = PathParams::default().with_max_cost(4.0);
        let result = find_path(&grid, GridIndex::new(0, 0), GridIndex::new(5, 0), &params);
        assert_eq!(result.result, PathResult::SearchFail);

        let params = PathParams::default().with_max_cost(5.0);
        assert!(find_path(&grid, GridIndex::new(0, 0), GridIndex::new(5, 0), &params).is_success());
    }

    #[test]
    fn test_occupied_target_rejected() {
        let mut grid = grid(Topology::Square);
        let goal = GridIndex::new(3, 0);
        grid.set_occupant(goal, UnitId::new());

        let result = find_path(&grid, GridIndex::new(0, 0), goal, &PathParams::default());
        assert_eq!(result.result, PathResult::SearchFail);

        let params = PathParams {
            allow_occupied_target: true,
            ..PathParams::default()
        };
        assert!(find_path(&grid, GridIndex::new(0, 0), goal, &params).is_success());
    }

    #[test]
    fn test_allies_pass_enemies_block() {
        let mut grid = grid(Topology::Square);
        // Corridor one tile wide along z = 0
        for x in 0..10 {
            for z in 1..10 {
                grid.set_tile_type(GridIndex::new(x, z), TileType::Obstacle);
            }
        }
        let ally = UnitId::new();
        let enemy = UnitId::new();
        grid.set_occupant(GridIndex::new(2, 0), ally);

        let mut enemies = AHashSet::new();
        enemies.insert(enemy);
        let params = PathParams::default().with_blocking(Blocking::Units(enemies));
        assert!(find_path(&grid, GridIndex::new(0, 0), GridIndex::new(5, 0), &params).is_success());

        grid.set_occupant(GridIndex::new(3, 0), enemy);
        let result = find_path(&grid, GridIndex::new(0, 0), GridIndex::new(5, 0), &params);
        assert_eq!(result.result, PathResult::SearchFail);
    }

    #[test]
    fn test_flying_only_requires_permission() {
        let mut grid = grid(Topology::Square);
        for z in 0..10 {
            grid.set_tile_type(GridIndex::new(4, z), TileType::FlyingOnly);
        }
        let start = GridIndex::new(0, 0);
        let goal = GridIndex::new(8, 0);
        assert!(!find_path(&grid, start, goal, &PathParams::default()).is_success());

        let mut params = PathParams::default();
        params.valid_tile_types.push(TileType::FlyingOnly);
        assert!(find_path(&grid, start, goal, &params).is_success());
    }

    #[test]
    fn test_deterministic_tie_break() {
        let grid = grid(Topology::Hexagon);
        let a = find_path(&grid, GridIndex::new(0, 0), GridIndex::new(4, 6), &PathParams::default());
        let b = find_path(&grid, GridIndex::new(0, 0), GridIndex::new(4, 6), &PathParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_path_cost_matches_search() {
        let mut grid = grid(Topology::Square);
        grid.set_tile_type(GridIndex::new(1, 1), TileType::DoubleCost);
        let params = PathParams::default();
        let result = find_path(&grid, GridIndex::new(0, 0), GridIndex::new(3, 3), &params);
        assert_eq!(path_cost(&grid, &result.path, &params), Some(result.cost));
        assert_eq!(
            path_cost(&grid, &[GridIndex::new(0, 0), GridIndex::new(5, 5)], &params),
            None
        );
    }

    #[test]
    fn test_reachable_indexes() {
        let grid = grid(Topology::Square);
        let params = PathParams::default().with_max_cost(1.0);
        let reachable = reachable_indexes(&grid, GridIndex::new(5, 5), &params);
        assert_eq!(reachable.len(), 8);

        let params = PathParams::default().with_max_cost(2.0);
        let reachable = reachable_indexes(&grid, GridIndex::new(5, 5), &params);
        assert_eq!(reachable.len(), 24);
        assert!(!reachable.contains(&GridIndex::new(5, 5)));
    }
}

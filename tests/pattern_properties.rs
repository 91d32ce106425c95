//! Property tests for patterns and the pathfinder

use std::collections::HashSet;

use proptest::prelude::*;
use tactical_grid::battle::*;
use tactical_grid::core::config::GridConfig;

const KINDS: [PatternKind; 7] = [
    PatternKind::None,
    PatternKind::Line,
    PatternKind::Diagonal,
    PatternKind::HalfDiagonal,
    PatternKind::Star,
    PatternKind::Diamond,
    PatternKind::Square,
];

const TOPOLOGIES: [Topology; 3] = [Topology::Square, Topology::Hexagon, Topology::Triangle];

fn as_set(cells: &[GridIndex]) -> HashSet<GridIndex> {
    cells.iter().copied().collect()
}

fn relative(origin: GridIndex, cells: &[GridIndex]) -> HashSet<GridIndex> {
    cells.iter().map(|cell| *cell - origin).collect()
}

fn open_grid(topology: Topology) -> GridStore {
    GridStore::from_config(&GridConfig {
        topology,
        columns: 12,
        rows: 12,
        ..GridConfig::default()
    })
}

proptest! {
    #[test]
    fn patterns_never_repeat_a_cell(
        x in -20i32..20,
        z in -20i32..20,
        min in 0i32..4,
        extra in 0i32..4,
        kind in 0usize..KINDS.len(),
        topology in 0usize..TOPOLOGIES.len(),
    ) {
        let cells = generate_pattern(
            GridIndex::new(x, z),
            TOPOLOGIES[topology],
            RangeSpec::new(min, min + extra),
            KINDS[kind],
        );
        prop_assert_eq!(as_set(&cells).len(), cells.len());
    }

    #[test]
    fn range_is_union_of_rings(
        x in -20i32..20,
        z in -20i32..20,
        min in 0i32..4,
        extra in 0i32..4,
        kind in 1usize..KINDS.len(),
        topology in 0usize..TOPOLOGIES.len(),
    ) {
        let origin = GridIndex::new(x, z);
        let kind = KINDS[kind];
        // Halving does not distribute over single rings
        prop_assume!(kind != PatternKind::HalfDiagonal && kind != PatternKind::Star);
        let topology = TOPOLOGIES[topology];

        let whole = generate_pattern(origin, topology, RangeSpec::new(min, min + extra), kind);
        let mut rings = HashSet::new();
        for i in min..=min + extra {
            rings.extend(generate_pattern(origin, topology, RangeSpec::new(i, i), kind));
        }
        prop_assert_eq!(as_set(&whole), rings);
    }

    #[test]
    fn star_is_line_plus_diagonal_on_squares(
        x in -20i32..20,
        z in -20i32..20,
        min in 0i32..4,
        extra in 0i32..4,
    ) {
        let origin = GridIndex::new(x, z);
        let range = RangeSpec::new(min, min + extra);
        let star = generate_pattern(origin, Topology::Square, range, PatternKind::Star);
        let mut expected = as_set(&generate_pattern(origin, Topology::Square, range, PatternKind::Line));
        expected.extend(generate_pattern(origin, Topology::Square, range, PatternKind::Diagonal));
        prop_assert_eq!(as_set(&star), expected);
    }

    #[test]
    fn square_patterns_are_point_symmetric(
        min in 0i32..5,
        extra in 0i32..4,
        kind in 0usize..KINDS.len(),
    ) {
        let cells = generate_pattern(
            GridIndex::ZERO,
            Topology::Square,
            RangeSpec::new(min, min + extra),
            KINDS[kind],
        );
        let set = as_set(&cells);
        for cell in &cells {
            prop_assert!(set.contains(&-*cell));
        }
    }

    #[test]
    fn shape_is_stable_under_parity_preserving_shifts(
        x in -10i32..10,
        z in -10i32..10,
        dx in -5i32..5,
        dz in -5i32..5,
        min in 0i32..3,
        extra in 0i32..3,
        kind in 0usize..KINDS.len(),
        topology in 0usize..TOPOLOGIES.len(),
    ) {
        let topology = TOPOLOGIES[topology];
        let range = RangeSpec::new(min, min + extra);
        let kind = KINDS[kind];
        let a = GridIndex::new(x, z);
        // Even row and column shifts keep hex row parity and triangle facing
        let b = a + GridIndex::new(2 * dx, 2 * dz);

        let from_a = relative(a, &generate_pattern(a, topology, range, kind));
        let from_b = relative(b, &generate_pattern(b, topology, range, kind));
        prop_assert_eq!(from_a, from_b);
    }

    #[test]
    fn hex_rings_hold_exact_distance(
        x in -10i32..10,
        z in -10i32..10,
        ring in 1i32..6,
    ) {
        let origin = GridIndex::new(x, z);
        let cells = generate_pattern(origin, Topology::Hexagon, RangeSpec::new(ring, ring), PatternKind::Diamond);
        prop_assert_eq!(cells.len(), 6 * ring as usize);
        for cell in cells {
            prop_assert_eq!(hex_distance(origin, cell), ring as u32);
        }
    }

    #[test]
    fn open_grid_paths_match_step_distance(
        ox in 0i32..12,
        oz in 0i32..12,
        tx in 0i32..12,
        tz in 0i32..12,
        topology in 0usize..2,
    ) {
        let topology = TOPOLOGIES[topology];
        let grid = open_grid(topology);
        let origin = GridIndex::new(ox, oz);
        let target = GridIndex::new(tx, tz);

        let result = find_path(&grid, origin, target, &PathParams::default());
        if origin == target {
            prop_assert_eq!(result.result, PathResult::NoPathNeeded);
        } else {
            prop_assert_eq!(result.result, PathResult::Success);
            prop_assert_eq!(result.cost, topology.step_distance(origin, target) as f32);
            prop_assert_eq!(result.path.len() as f32, result.cost + 1.0);
        }
    }

    #[test]
    fn paths_are_connected_and_costed(
        ox in 0i32..12,
        oz in 0i32..12,
        tx in 0i32..12,
        tz in 0i32..12,
        topology in 0usize..TOPOLOGIES.len(),
        walls in proptest::collection::vec((0i32..12, 0i32..12), 0..30),
    ) {
        let topology = TOPOLOGIES[topology];
        let mut grid = open_grid(topology);
        let origin = GridIndex::new(ox, oz);
        let target = GridIndex::new(tx, tz);
        for (x, z) in walls {
            let wall = GridIndex::new(x, z);
            if wall != origin && wall != target {
                grid.set_tile_type(wall, TileType::Obstacle);
            }
        }

        let params = PathParams::default();
        let result = find_path(&grid, origin, target, &params);
        if result.is_success() {
            prop_assert_eq!(result.path.first(), Some(&origin));
            prop_assert_eq!(result.path.last(), Some(&target));
            for step in result.path.windows(2) {
                prop_assert!(topology.neighbors(step[0]).any(|n| n == step[1]));
                prop_assert!(grid.is_walkable(step[1]));
            }
            prop_assert_eq!(path_cost(&grid, &result.path, &params), Some(result.cost));
            prop_assert!(result.cost >= topology.step_distance(origin, target) as f32);
        }
    }

    #[test]
    fn reachable_tiles_are_within_budget(
        ox in 0i32..12,
        oz in 0i32..12,
        budget in 1u32..6,
        topology in 0usize..TOPOLOGIES.len(),
    ) {
        let topology = TOPOLOGIES[topology];
        let grid = open_grid(topology);
        let origin = GridIndex::new(ox, oz);
        let params = PathParams::default().with_max_cost(budget as f32);

        let reachable = reachable_indexes(&grid, origin, &params);
        prop_assert!(!reachable.contains(&origin));
        for index in reachable {
            let result = find_path(&grid, origin, index, &params);
            prop_assert!(result.is_success());
            prop_assert!(result.cost <= budget as f32);
        }
    }
}

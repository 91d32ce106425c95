//! Speculative path queries against orchestrator snapshots

use tactical_grid::battle::*;
use tactical_grid::core::config::EngineConfig;
use tactical_grid::core::types::TeamId;

#[tokio::test]
async fn test_preview_uses_snapshot_while_orchestrator_mutates() {
    let mut orc = CombatOrchestrator::new(EngineConfig::default()).unwrap();
    let a = orc.spawn_unit("Scout", UnitStats::default(), vec![]);
    orc.add_unit_to_combat(a, GridIndex::new(0, 0), Some(TeamId(0))).unwrap();

    let params = orc.movement_params(orc.unit(a).unwrap());
    let mut query = PathQuery::current();
    query.request(orc.grid_snapshot(), GridIndex::new(0, 0), GridIndex::new(3, 0), params);

    // The live grid changes; the running search keeps its own copy
    orc.set_tile_type(GridIndex::new(1, 0), TileType::Obstacle).unwrap();

    let result = query.wait().await.unwrap();
    assert!(result.is_success());
    assert_eq!(result.cost, 3.0);
    assert!(orc.grid().tile(GridIndex::new(1, 0)).unwrap().tile_type == TileType::Obstacle);
}

#[tokio::test]
async fn test_hover_sweep_answers_last_tile() {
    let mut orc = CombatOrchestrator::new(EngineConfig::default()).unwrap();
    let a = orc.spawn_unit("Scout", UnitStats::default(), vec![]);
    orc.add_unit_to_combat(a, GridIndex::new(0, 0), Some(TeamId(0))).unwrap();
    let params = orc.movement_params(orc.unit(a).unwrap());

    let mut query = PathQuery::current();
    for x in 1..=5 {
        query.request(orc.grid_snapshot(), GridIndex::new(0, 0), GridIndex::new(x, 2), params.clone());
    }
    assert_eq!(query.dispatched(), 1);

    let result = query.wait().await.unwrap();
    assert_eq!(result.destination(), Some(GridIndex::new(5, 2)));

    orc.apply_path_preview(&result);
    let flagged = orc.grid().indexes_with_state(TileState::InPath);
    assert_eq!(flagged.len(), result.path.len());
    assert!(flagged.contains(&GridIndex::new(5, 2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_preview_changes_nothing() {
    let mut orc = CombatOrchestrator::new(EngineConfig::default()).unwrap();
    let a = orc.spawn_unit("Scout", UnitStats::default(), vec![]);
    orc.add_unit_to_combat(a, GridIndex::new(0, 0), Some(TeamId(0))).unwrap();
    let params = orc.movement_params(orc.unit(a).unwrap());

    let mut query = PathQuery::current();
    query.request(orc.grid_snapshot(), GridIndex::new(0, 0), GridIndex::new(9, 9), params);
    let result = query.wait().await.unwrap();

    // Dash range is 8 tiles, the corner is 9 away
    assert_eq!(result.result, PathResult::SearchFail);
    orc.apply_path_preview(&result);
    assert!(orc.grid().indexes_with_state(TileState::InPath).is_empty());
    assert_eq!(orc.unit(a).unwrap().grid_index, GridIndex::new(0, 0));
}

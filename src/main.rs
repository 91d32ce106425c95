//! Headless Skirmish Runner
//!
//! Two small squads advance on each other and fight until one side is gone
//! or the round limit runs out. Prints a JSON (or text) summary.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use tactical_grid::battle::{
    find_path, step_cost, AabbOccluders, AbilityDef, CombatOrchestrator, GridIndex, PathParams,
    Topology, UnitStats, UNIT_COLLIDER_HALF_WIDTH, UNIT_COLLIDER_HEIGHT,
};
use tactical_grid::core::config::EngineConfig;
use tactical_grid::core::error::{Result, TacticsError};
use tactical_grid::core::types::{TeamId, UnitId};

/// Headless Skirmish Runner - two squads fight on a generated grid
#[derive(Parser, Debug)]
#[command(name = "tactical-grid")]
#[command(about = "Run a deterministic two-team skirmish and print the outcome")]
struct Args {
    /// Grid shape: square, hex or triangle (overrides the config file)
    #[arg(long)]
    topology: Option<String>,

    /// Grid width in tiles
    #[arg(long)]
    columns: Option<i32>,

    /// Grid height in tiles
    #[arg(long)]
    rows: Option<i32>,

    /// Maximum full rounds before the skirmish is called a draw
    #[arg(long, default_value_t = 20)]
    rounds: u32,

    /// Random seed for effect rolls
    #[arg(long)]
    seed: Option<u64>,

    /// Engine configuration TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,
}

#[derive(Serialize)]
struct UnitSummary {
    name: String,
    team: Option<u32>,
    health: i32,
    position: Option<(i32, i32)>,
}

#[derive(Serialize)]
struct SkirmishResult {
    outcome: String,
    winner: Option<u32>,
    rounds: u32,
    ticks: u64,
    events: usize,
    topology: Topology,
    seed: u64,
    units: Vec<UnitSummary>,
}

fn parse_topology(name: &str) -> Result<Topology> {
    match name.to_ascii_lowercase().as_str() {
        "square" => Ok(Topology::Square),
        "hex" | "hexagon" => Ok(Topology::Hexagon),
        "triangle" => Ok(Topology::Triangle),
        other => Err(TacticsError::Config(format!("unknown topology '{}'", other))),
    }
}

fn build_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(topology) = &args.topology {
        config.grid.topology = parse_topology(topology)?;
    }
    if let Some(columns) = args.columns {
        config.grid.columns = columns;
    }
    if let Some(rows) = args.rows {
        config.grid.rows = rows;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate().map_err(TacticsError::Config)?;
    Ok(config)
}

/// Deploy a squad of two footmen and an archer along one edge
fn deploy_squad(orc: &mut CombatOrchestrator, team: TeamId, column: i32, sight: f32) -> Result<Vec<UnitId>> {
    let rows = orc.config().grid.rows;
    let shoot = AbilityDef::strike("Shoot", 3, 1, 2);
    let sighted = shoot.range.with_line_of_sight(sight);
    let bow = shoot.with_range(sighted).with_cost(2);
    let roster = [
        ("Footman", vec![AbilityDef::strike("Strike", 1, 2, 4)]),
        ("Footman", vec![AbilityDef::strike("Strike", 1, 2, 4)]),
        ("Archer", vec![bow, AbilityDef::strike("Strike", 1, 1, 2)]),
    ];

    let mut ids = Vec::new();
    for (slot, (name, abilities)) in roster.into_iter().enumerate() {
        let id = orc.spawn_unit(format!("{} {}", name, team), UnitStats::default(), abilities);
        let row = (rows / 2 - 1 + slot as i32).clamp(0, rows - 1);
        orc.add_unit_to_combat(id, GridIndex::new(column, row), Some(team))?;
        ids.push(id);
    }
    Ok(ids)
}

/// Strike the first enemy any ability can reach; returns true if one was used
fn try_attack(orc: &mut CombatOrchestrator, unit: UnitId, occluders: &AabbOccluders) -> bool {
    let Some(caster) = orc.unit(unit) else {
        return false;
    };
    let enemies = orc.teams().enemies_of(unit);
    let mut targets: Vec<GridIndex> = enemies
        .iter()
        .filter_map(|enemy| orc.unit(*enemy).map(|u| u.grid_index))
        .collect();
    targets.sort();
    let abilities: Vec<String> = caster.abilities.abilities.iter().map(|a| a.name.clone()).collect();

    for ability in abilities {
        for target in &targets {
            if orc.try_activate_ability(unit, &ability, *target, occluders).is_ok() {
                orc.settle();
                return true;
            }
        }
    }
    false
}

/// Walk toward the nearest enemy, stopping while a strike is still affordable
fn advance(orc: &mut CombatOrchestrator, unit: UnitId) -> Result<()> {
    let Some(mover) = orc.unit(unit) else {
        return Ok(());
    };
    let topology = orc.grid().topology();
    let origin = mover.grid_index;
    let nearest = orc
        .teams()
        .enemies_of(unit)
        .iter()
        .filter_map(|enemy| orc.unit(*enemy).map(|u| u.grid_index))
        .min_by_key(|index| (topology.step_distance(origin, *index), *index));
    let Some(goal) = nearest else {
        return Ok(());
    };

    let mut params: PathParams = orc.movement_params(mover);
    params.allow_occupied_target = true;
    let budget = mover.stats.move_range;
    let search = find_path(orc.grid(), origin, goal, &params);
    if !search.is_success() {
        return Ok(());
    }

    // Stop short of the enemy and within a plain move.
    let mut path = vec![origin];
    let mut spent = 0.0;
    for step in search.path.windows(2) {
        if step[1] == goal {
            break;
        }
        let Some(cost) = step_cost(orc.grid(), step[0], step[1], &params) else {
            break;
        };
        if spent + cost > budget {
            break;
        }
        spent += cost;
        path.push(step[1]);
    }
    while path.len() > 1 && orc.grid().occupant(path[path.len() - 1]).is_some() {
        path.pop();
    }
    if path.len() < 2 {
        return Ok(());
    }

    orc.move_unit(unit, &path)?;
    orc.settle();
    Ok(())
}

fn take_turn(orc: &mut CombatOrchestrator, unit: UnitId, occluders: &mut AabbOccluders) -> Result<()> {
    occluders.sync_units(orc.grid(), UNIT_COLLIDER_HALF_WIDTH, UNIT_COLLIDER_HEIGHT);
    if try_attack(orc, unit, occluders) {
        return Ok(());
    }
    advance(orc, unit)?;
    occluders.sync_units(orc.grid(), UNIT_COLLIDER_HALF_WIDTH, UNIT_COLLIDER_HEIGHT);
    try_attack(orc, unit, occluders);
    Ok(())
}

fn run(args: &Args) -> Result<SkirmishResult> {
    let config = build_config(args)?;
    let sight = config.visibility.default_height;
    let topology = config.grid.topology;
    let seed = config.seed;
    let columns = config.grid.columns;

    let mut orc = CombatOrchestrator::new(config)?;
    let mut all_units = deploy_squad(&mut orc, TeamId(0), 0, sight)?;
    all_units.extend(deploy_squad(&mut orc, TeamId(1), columns - 1, sight)?);

    let start = orc.start_combat();
    if !start.can_start_combat {
        return Err(TacticsError::Config(format!("combat could not start: {:?}", start)));
    }

    let mut occluders = AabbOccluders::new();
    let mut events = orc.events_mut().drain().len();
    let mut rounds = 0;
    let mut turns_this_round = 0;
    while rounds < args.rounds && orc.teams().non_empty_count() > 1 {
        let Some(active) = orc.active_unit() else {
            break;
        };
        take_turn(&mut orc, active, &mut occluders)?;

        turns_this_round += 1;
        if turns_this_round >= orc.units_in_combat().len() {
            turns_this_round = 0;
            rounds += 1;
            tracing::info!("Round {} complete, {} units standing", rounds, orc.units_in_combat().len());
        }
        if orc.teams().non_empty_count() > 1 {
            orc.next_unit()?;
        }
        events += orc.events_mut().drain().len();
    }

    let teams = orc.teams().active_teams();
    let winner = if teams.len() == 1 { teams.first().map(|team| team.0) } else { None };
    orc.end_combat();
    events += orc.events_mut().drain().len();

    let units = all_units
        .iter()
        .filter_map(|id| orc.unit(*id))
        .map(|unit| UnitSummary {
            name: unit.name.clone(),
            team: unit.team.or(unit.previous_team).map(|team| team.0),
            health: unit.health.current,
            position: unit.is_on_grid().then_some((unit.grid_index.x, unit.grid_index.z)),
        })
        .collect();

    Ok(SkirmishResult {
        outcome: if winner.is_some() { "victory".into() } else { "draw".into() },
        winner,
        rounds,
        ticks: orc.current_tick(),
        events,
        topology,
        seed,
        units,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("tactical_grid=info")
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = run(&args)?;

    if args.format == "json" {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize result: {}", e),
        }
    } else {
        println!("=== SKIRMISH RESULT ===");
        println!("Outcome: {}", result.outcome);
        if let Some(winner) = result.winner {
            println!("Winner: team {}", winner);
        }
        println!("Rounds: {}  Ticks: {}  Events: {}", result.rounds, result.ticks, result.events);
        println!("Topology: {:?}  Seed: {}", result.topology, result.seed);
        println!();
        for unit in &result.units {
            let position = unit
                .position
                .map(|(x, z)| format!("({}, {})", x, z))
                .unwrap_or_else(|| "off grid".into());
            println!("  {:<12} team {:?}  hp {:>3}  at {}", unit.name, unit.team, unit.health, position);
        }
    }
    Ok(())
}
